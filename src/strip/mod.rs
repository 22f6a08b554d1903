//! Type-annotation stripping
//!
//! Learner submissions and mission test scripts are written in TypeScript,
//! while the sandbox only executes JavaScript. The stripper tokenizes the
//! source and deletes the byte ranges that carry type syntax, leaving every
//! other character (strings, comments, whitespace) where it was. It never
//! type-checks anything.
//!
//! # Rules
//!
//! | Flag | Removes |
//! |------|---------|
//! | `EXPORTS` | `export` / `export default` qualifiers and `export { .. }` lists |
//! | `GENERICS` | `<T>` parameter and argument lists before `(` |
//! | `PARAM_TYPES` | `: T` and `?` in function and method parameter lists |
//! | `ARROW_PARAM_TYPES` | the same inside arrow heads |
//! | `RETURN_TYPES` | `): T` before a body or `=>` |
//! | `VARIABLE_TYPES` | `: T` after `const`/`let`/`var` bindings |
//! | `INTERFACES` | whole `interface` declarations, nested braces included |
//! | `TYPE_ALIASES` | whole `type X = ...` declarations |
//! | `IMPORTS` | `import` statements (test code only) |
//! | `EXPRESSION_TYPES` | `as T`, `satisfies T`, `x!`, class member modifiers and annotations, `implements`, overload signatures, `declare` |
//! | `ENUMS` | rewrites `enum` declarations into plain objects |
//!
//! # Example
//!
//! ```
//! use mission_runner::strip::strip_types;
//!
//! let js = strip_types("export function sum(xs: number[]): number { return 0 }").unwrap();
//! assert_eq!(js, "function sum(xs) { return 0 }");
//! ```

mod pass;

use crate::error::Result;
use crate::lexer::Lexer;
use pass::StripPass;

bitflags::bitflags! {
    /// Set of rewrites applied by a [`TypeStripper`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StripRules: u32 {
        const EXPORTS = 1 << 0;
        const GENERICS = 1 << 1;
        const PARAM_TYPES = 1 << 2;
        const ARROW_PARAM_TYPES = 1 << 3;
        const RETURN_TYPES = 1 << 4;
        const VARIABLE_TYPES = 1 << 5;
        const INTERFACES = 1 << 6;
        const TYPE_ALIASES = 1 << 7;
        const IMPORTS = 1 << 8;
        const EXPRESSION_TYPES = 1 << 9;
        const ENUMS = 1 << 10;

        /// Everything applied to learner submissions
        const LEARNER = Self::EXPORTS.bits()
            | Self::GENERICS.bits()
            | Self::PARAM_TYPES.bits()
            | Self::ARROW_PARAM_TYPES.bits()
            | Self::RETURN_TYPES.bits()
            | Self::VARIABLE_TYPES.bits()
            | Self::INTERFACES.bits()
            | Self::TYPE_ALIASES.bits()
            | Self::EXPRESSION_TYPES.bits()
            | Self::ENUMS.bits();

        /// Learner rules plus import removal, applied to test scripts
        const TEST_CODE = Self::LEARNER.bits() | Self::IMPORTS.bits();
    }
}

impl Default for StripRules {
    fn default() -> Self {
        StripRules::LEARNER
    }
}

/// Removes TypeScript type syntax from source text
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeStripper {
    rules: StripRules,
}

impl TypeStripper {
    pub fn new(rules: StripRules) -> Self {
        Self { rules }
    }

    /// Stripper configured for learner submissions
    pub fn learner() -> Self {
        Self::new(StripRules::LEARNER)
    }

    /// Stripper configured for mission test scripts
    pub fn test_code() -> Self {
        Self::new(StripRules::TEST_CODE)
    }

    pub fn rules(&self) -> StripRules {
        self.rules
    }

    /// Strip `source`. Fails only when the source cannot be tokenized;
    /// constructs the stripper does not recognize are passed through and
    /// surface later as syntax errors.
    pub fn strip(&self, source: &str) -> Result<String> {
        let tokens = Lexer::new(source).tokenize()?;
        let mut pass = StripPass::new(source, &tokens, self.rules);
        pass.run();
        Ok(pass.finish())
    }
}

/// Strip learner code (every rule except import removal)
pub fn strip_types(source: &str) -> Result<String> {
    TypeStripper::learner().strip(source)
}

/// Strip test code (every rule, including import removal)
pub fn strip_test_code(source: &str) -> Result<String> {
    TypeStripper::test_code().strip(source)
}

/// Whether stripping with every rule would change `source`
pub fn looks_like_typescript(source: &str) -> bool {
    match TypeStripper::test_code().strip(source) {
        Ok(stripped) => stripped != source,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strip(source: &str) -> String {
        strip_types(source).unwrap()
    }

    #[test]
    fn test_export_qualifiers() {
        assert_eq!(strip("export function f() {}"), "function f() {}");
        assert_eq!(strip("export const x = 1;"), "const x = 1;");
        assert_eq!(strip("export default function g() {}"), "function g() {}");
        assert_eq!(strip("const a = 1;\nexport { a };\n"), "const a = 1;\n\n");
        assert_eq!(strip("export async function h() {}"), "async function h() {}");
    }

    #[test]
    fn test_generic_parameters() {
        assert_eq!(
            strip("function identity<T>(value: T): T { return value }"),
            "function identity(value) { return value }"
        );
        assert_eq!(
            strip("const m = new Map<string, Array<number>>();"),
            "const m = new Map();"
        );
        assert_eq!(strip("const f = <T,>(x: T) => x;"), "const f = (x) => x;");
    }

    #[test]
    fn test_parameter_types() {
        assert_eq!(
            strip("function greet(name: string, punct?: string, n: number = 1) {}"),
            "function greet(name, punct, n = 1) {}"
        );
        assert_eq!(
            strip("function f({ a, b }: { a: number; b: number }, cb: (x: number) => void) {}"),
            "function f({ a, b }, cb) {}"
        );
    }

    #[test]
    fn test_arrow_parameter_and_return_types() {
        assert_eq!(
            strip("const add = (a: number, b: number): number => a + b;"),
            "const add = (a, b) => a + b;"
        );
        assert_eq!(
            strip("xs.reduce((acc: number, n: number) => acc + n, 0)"),
            "xs.reduce((acc, n) => acc + n, 0)"
        );
    }

    #[test]
    fn test_return_types() {
        assert_eq!(
            strip("function f(): Promise<Array<string>> {}"),
            "function f() {}"
        );
        assert_eq!(
            strip("function g(): { ok: boolean } { return { ok: true } }"),
            "function g() { return { ok: true } }"
        );
        assert_eq!(
            strip("function isStr(x: unknown): x is string { return true }"),
            "function isStr(x) { return true }"
        );
    }

    #[test]
    fn test_variable_types() {
        assert_eq!(
            strip("let total: number = 0;\nconst names: string[] = [];"),
            "let total = 0;\nconst names = [];"
        );
        assert_eq!(
            strip("const lookup: Record<string, number[]> = {};"),
            "const lookup = {};"
        );
        assert_eq!(strip("let later!: string;"), "let later;");
    }

    #[test]
    fn test_interfaces_with_nested_braces() {
        let source = "interface User {\n  name: string;\n  address: { city: string; geo: { lat: number } };\n}\nconst x = 1;";
        assert_eq!(strip(source), "\nconst x = 1;");
        assert_eq!(
            strip("export interface A extends B<C> { a: number }\nlet y = 2;"),
            "\nlet y = 2;"
        );
    }

    #[test]
    fn test_type_aliases() {
        assert_eq!(
            strip("type Id = string | number;\nconst id = 1;"),
            "\nconst id = 1;"
        );
        assert_eq!(
            strip("type Pair<T> = {\n  left: T;\n  right: T;\n};\nlet p = 0;"),
            "\nlet p = 0;"
        );
        // a variable called `type` is not an alias
        assert_eq!(strip("let type = 1; type = 2;"), "let type = 1; type = 2;");
    }

    #[test]
    fn test_imports_only_removed_from_test_code() {
        let source = "import { sum } from './solution';\nimport type { T } from \"./t\";\ntest('x', () => {});";
        assert_eq!(
            strip_test_code(source).unwrap(),
            "\n\ntest('x', () => {});"
        );
        assert!(strip_types(source).unwrap().contains("import { sum }"));
    }

    #[test]
    fn test_expression_level_types() {
        assert_eq!(strip("const n = (input as any).length;"), "const n = (input).length;");
        assert_eq!(strip("const k = ['a', 'b'] as const;"), "const k = ['a', 'b'];");
        assert_eq!(strip("const v = map.get(key)!.value;"), "const v = map.get(key).value;");
        assert_eq!(strip("try { f() } catch (e: unknown) {}"), "try { f() } catch (e) {}");
    }

    #[test]
    fn test_class_members() {
        let source = "class Stack<T> implements Container {\n  private items: T[] = [];\n  readonly limit?: number;\n  push(item: T): void { this.items.push(item); }\n  peek(): T | undefined { return this.items[this.items.length - 1]; }\n}";
        let expected = "class Stack {\n  items = [];\n  limit;\n  push(item) { this.items.push(item); }\n  peek() { return this.items[this.items.length - 1]; }\n}";
        assert_eq!(strip(source), expected);
    }

    #[test]
    fn test_constructor_parameter_properties() {
        let js = strip("class P { constructor(private name: string, public age: number) {} }");
        assert_eq!(
            js,
            "class P { constructor(name, age) { this.name = name; this.age = age;} }"
        );
    }

    #[test]
    fn test_overload_signatures_removed() {
        let source = "function f(a: string): string;\nfunction f(a: any) { return a }";
        assert_eq!(strip(source), "\nfunction f(a) { return a }");
    }

    #[test]
    fn test_enums_become_objects() {
        let js = strip("enum Color { Red, Green = 5, Blue }");
        assert!(js.contains("Color[Color[\"Red\"] = 0] = \"Red\""), "{}", js);
        assert!(js.contains("Color[Color[\"Blue\"] = 6] = \"Blue\""), "{}", js);
        let js = strip("enum Dir { Up = 'UP' }");
        assert!(js.contains("Dir[\"Up\"] = 'UP'"), "{}", js);
    }

    #[test]
    fn test_plain_javascript_is_untouched() {
        let sources = [
            "const r = a ? b : c;",
            "const o = { a: 1, b: { c: [1, 2] }, m(x) { return x } };",
            "label: for (let i = 0; i < n; i++) { if (a < b && c > d) break label; }",
            "const s = 'type: interface as any';",
            "const t = `x: ${a ? 1 : 2}`;",
            "if (!done) { x = !y; }",
            "switch (k) { case 1: f(); break; default: g(); }",
        ];
        for source in sources {
            assert_eq!(strip(source), source);
        }
    }

    #[test]
    fn test_stripping_is_idempotent() {
        let source = "export interface Item { id: number; tags: { name: string }[] }\nexport function total(items: Item[], rate: number = 0.1): number {\n  const sum: number = items.reduce((acc: number, i: Item): number => acc + i.id, 0);\n  return sum * (1 + rate) as number;\n}\ntype Alias<T> = Map<string, Array<T>>;";
        let once = strip_test_code(source).unwrap();
        let twice = strip_test_code(&once).unwrap();
        assert_eq!(once, twice);
        assert!(!once.contains("interface"));
        assert!(!once.contains(": number"));
    }

    #[test]
    fn test_looks_like_typescript() {
        assert!(looks_like_typescript("let x: number = 1"));
        assert!(!looks_like_typescript("let x = 1"));
    }

    #[test]
    fn test_lexer_errors_propagate() {
        assert!(strip_types("let s = 'unterminated").is_err());
    }
}
