//! Type stripping on realistic mission code

mod common;
use common::run;
use mission_runner::strip::{strip_test_code, strip_types, StripRules, TypeStripper};
use pretty_assertions::assert_eq;

/// One sample per rewrite rule, each exercising only that rule.
const RULE_SAMPLES: &[(StripRules, &str)] = &[
    (StripRules::EXPORTS, "export function f() { return 1 }\nexport default class A {}"),
    (StripRules::GENERICS, "function first<T>(xs) { return xs[0] }\nconst s = new Set<number>();"),
    (StripRules::PARAM_TYPES, "function area(w: number, h?: number) { return w * (h || w) }"),
    (StripRules::ARROW_PARAM_TYPES, "const twice = (n: number) => n * 2;"),
    (StripRules::RETURN_TYPES, "function ok(): boolean { return true }\nconst g = (): string => 'g';"),
    (StripRules::VARIABLE_TYPES, "const ids: number[] = [1, 2];\nlet name: string | null = null;"),
    (StripRules::INTERFACES, "interface Point { x: number; meta: { tag: string } }\nconst p = 1;"),
    (StripRules::TYPE_ALIASES, "type Shape = { kind: 'circle'; r: number } | { kind: 'square' };\nconst q = 2;"),
    (StripRules::IMPORTS, "import { solve } from './solution';\nimport * as utils from './utils';\nsolve();"),
];

#[test]
fn test_each_rule_is_idempotent() {
    for (rules, source) in RULE_SAMPLES {
        let stripper = TypeStripper::new(*rules);
        let once = stripper.strip(source).unwrap();
        assert_ne!(&once, source, "{:?} changed nothing", rules);
        assert_eq!(stripper.strip(&once).unwrap(), once, "{:?}", rules);
    }
}

#[test]
fn test_full_rule_set_is_idempotent() {
    for (_, source) in RULE_SAMPLES {
        let once = strip_test_code(source).unwrap();
        assert_eq!(strip_test_code(&once).unwrap(), once);
    }
}

#[test]
fn test_rules_are_independent() {
    let source = "export const n: number = 1;";
    assert_eq!(
        TypeStripper::new(StripRules::EXPORTS).strip(source).unwrap(),
        "const n: number = 1;"
    );
    assert_eq!(
        TypeStripper::new(StripRules::VARIABLE_TYPES).strip(source).unwrap(),
        "export const n = 1;"
    );
}

#[test]
fn test_stripped_learner_code_runs() {
    let learner = r#"
export interface Person {
  name: string;
  age: number;
  address?: { city: string };
}

export type Comparator<T> = (a: T, b: T) => number;

const byAge: Comparator<Person> = (a: Person, b: Person): number => a.age - b.age;

export function sortByAge<T extends Person>(people: T[]): T[] {
  return [...people].sort(byAge);
}

export function names(people: Person[]): string[] {
  return people.map((p: Person) => p.name);
}
"#;
    let tests = r#"
import { sortByAge, names, Person } from './solution';

describe('sortByAge', () => {
  const people: Person[] = [
    { name: 'Grace', age: 85 },
    { name: 'Ada', age: 36 },
  ];

  test('sorts ascending', () => {
    expect(names(sortByAge(people))).toEqual(['Ada', 'Grace']);
  });

  test('does not mutate input', () => {
    sortByAge(people);
    expect(people[0].name).toBe('Grace');
  });
});
"#;
    let report = run(learner, tests);
    assert!(report.passed, "{:#?}", report);
    assert_eq!(report.total_tests, 2);
}

#[test]
fn test_classes_and_enums_strip() {
    let learner = r#"
export enum Level { Low = 1, Mid, High }

export class Counter {
  private count: number = 0;
  constructor(private readonly step: number = 1) {}

  increment(): this {
    this.count += this.step;
    return this;
  }

  get value(): number {
    return this.count;
  }
}
"#;
    let stripped = strip_types(learner).unwrap();
    assert!(!stripped.contains("private"));
    assert!(!stripped.contains("enum"));
    assert!(stripped.contains("class Counter"));
}

#[test]
fn test_generic_calls_and_assertions_run() {
    let learner = r#"
function wrap<T>(value: T): { value: T } {
  return { value };
}
const data = JSON.parse('[3, 1, 2]') as number[];
const top = data.find((n: number) => n > 2)!;
"#;
    let report = run(
        learner,
        "test('wraps', () => { expect(wrap<number>(top)).toEqual({ value: 3 }) })",
    );
    assert!(report.passed, "{:#?}", report);
}
