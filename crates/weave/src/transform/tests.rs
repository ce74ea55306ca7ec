use super::*;
use crate::extract::Extractor;
use crate::validate::IssueKind;

const CONTRACTS: (&str, &str) = (
    "src/contracts.ts",
    "export interface TodoServiceInterface {\n  list(): string[];\n}\nexport interface Logger {\n  log(m: string): void;\n}\n",
);

const TODO_SERVICE: (&str, &str) = (
    "src/TodoService.ts",
    r#"import type { TodoServiceInterface } from "./contracts";

@Service()
export class TodoService implements TodoServiceInterface {
  list() { return []; }
}
"#,
);

fn run_with(config: &WeaveConfig, files: &[(&str, &str)], target: &str) -> TransformationResult {
    let extractor = Extractor::new(config);
    let models: Vec<FileModel> = files
        .iter()
        .map(|(path, source)| extractor.extract(path, *source))
        .collect();

    let mut registry = InterfaceRegistry::new_run(config.resolution.profiles.clone());
    for model in &models {
        registry.register_file(model);
    }
    registry.finalize();

    let model = models.iter().find(|m| m.path == target).unwrap();
    FunctionalTransformer::new(&registry, config)
        .transform(model)
        .unwrap()
}

fn run(files: &[(&str, &str)], target: &str) -> TransformationResult {
    run_with(&WeaveConfig::default(), files, target)
}

#[test]
fn inline_access_is_rewritten_to_a_binding() {
    let card = r#"import type { TodoServiceInterface } from "./contracts";

export function Card(props: { services: { todo: Inject<TodoServiceInterface> } }) {
  return props.services.todo.list();
}
"#;
    let result = run(&[CONTRACTS, TODO_SERVICE, ("src/Card.tsx", card)], "src/Card.tsx");

    assert!(result.was_transformed);
    assert_eq!(
        result.rewritten_source,
        r#"import type { TodoServiceInterface } from "./contracts";
import { useService } from "@weave/runtime";

export function Card(props: { services: { todo: Inject<TodoServiceInterface> } }) {
  const todo = props.services?.todo ?? useService("TodoServiceInterface");
  return todo.list();
}
"#
    );
    assert_eq!(result.resolved_bindings.len(), 1);
    assert_eq!(
        result.resolved_bindings[0].implementation.as_deref(),
        Some("TodoService")
    );
    assert!(result.diagnostics.is_empty());
}

#[test]
fn missing_required_service_binds_a_throwing_proxy() {
    let dashboard = r#"interface Props {
  title: string;
  services: { api: Inject<ApiInterface> };
}

export function Dashboard({ title, services }: Props) {
  return <h1>{title}{services.api.name}</h1>;
}
"#;
    let result = run(&[("src/Dashboard.tsx", dashboard)], "src/Dashboard.tsx");
    let out = &result.rewritten_source;

    assert!(out.contains("export function Dashboard(props: Props) {\n  const { title } = props;\n"));
    assert!(out.contains(
        r#"  const api = props.services?.api ?? new Proxy({}, { get() { throw new Error("No implementation registered for ApiInterface (service 'api' of Dashboard)"); } });"#
    ));
    assert!(out.contains("  const services = { ...props.services, api };\n  return <h1>"));
    assert!(!out.contains("import {"), "{out}");

    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].kind, IssueKind::MissingImplementation);
    assert_eq!(result.diagnostics[0].keys[0].as_str(), "ApiInterface");
    assert!(result.resolved_bindings[0].implementation.is_none());
}

#[test]
fn generated_locals_do_not_shadow_module_bindings() {
    let card = r#"import { api } from "./legacy";

export function Card(props: { services: { api: Inject<ApiInterface> } }) {
  api.ping();
  return props.services.api.name;
}
"#;
    let result = run(&[("src/Card.tsx", card)], "src/Card.tsx");
    let out = &result.rewritten_source;

    assert!(out.contains("  const api_ = props.services?.api ?? new Proxy("), "{out}");
    assert!(out.contains("\n  api.ping();\n  return api_.name;\n"), "{out}");
    assert_eq!(result.resolved_bindings[0].local, "api_");
}

#[test]
fn expression_bodied_arrow_gets_a_block() {
    let badge = "const Badge = ({ services: { clock } }: { services: { clock: InjectOptional<Clock> } }) => <span>{clock?.now()}</span>;\n";
    let result = run(&[("src/Badge.tsx", badge)], "src/Badge.tsx");

    assert_eq!(
        result.rewritten_source,
        "const Badge = (props: { services: { clock: InjectOptional<Clock> } }) => {\n  const clock = props.services?.clock ?? undefined;\n  return (<span>{clock?.now()}</span>);\n};\n"
    );
    assert!(result.diagnostics.is_empty());
}

#[test]
fn rest_spread_gets_services_merged_back() {
    let panel = r#"import type { TodoServiceInterface } from "./contracts";
interface PanelProps {
  title: string;
  services: { todo: Inject<TodoServiceInterface> };
}

export function Panel({ title, ...rest }: PanelProps) {
  return <Child title={title} {...rest} />;
}
"#;
    let result = run(&[CONTRACTS, TODO_SERVICE, ("src/Panel.tsx", panel)], "src/Panel.tsx");
    let out = &result.rewritten_source;

    assert!(out.contains(
        "export function Panel(props: PanelProps) {\n  const { title, ...__rest } = props;\n  const todo = props.services?.todo ?? useService(\"TodoServiceInterface\");\n  const rest = { ...__rest, services: { ...props.services, todo } };\n  return <Child"
    ), "{out}");
}

#[test]
fn qualified_optional_request_uses_qualified_key() {
    let loggers = r#"import type { Logger } from "./contracts";

@Service()
export class ConsoleLogger implements Logger { log() {} }

@Service({ qualifier: "verbose" })
export class VerboseLogger implements Logger { log() {} }
"#;
    let view = r#"export function View(props: { services: { log: InjectOptional<Logger, "verbose"> } }) {
  return props.services.log;
}
"#;
    let result = run(
        &[CONTRACTS, ("src/loggers.ts", loggers), ("src/View.tsx", view)],
        "src/View.tsx",
    );
    assert!(result.rewritten_source.starts_with(
        "import { useOptionalService } from \"@weave/runtime\";\nexport function View"
    ));
    assert!(result
        .rewritten_source
        .contains("const log = props.services?.log ?? useOptionalService(\"Logger__qualifier_verbose\");"));
    assert_eq!(
        result.resolved_bindings[0].implementation.as_deref(),
        Some("VerboseLogger")
    );
}

#[test]
fn lifecycle_hooks_are_wired_into_one_effect() {
    let service = r#"@Service()
export class TodoService implements TodoServiceInterface {
  onMount({ signal }: { signal: AbortSignal }) {}
  onUnmount() {}
}
"#;
    let card = r#"import { useState } from "react";

export function Card(props: { services: { todo: Inject<TodoServiceInterface> } }) {
  const [items] = useState([]);
  return items;
}
"#;
    let result = run(
        &[CONTRACTS, ("src/TodoService.ts", service), ("src/Card.tsx", card)],
        "src/Card.tsx",
    );
    let out = &result.rewritten_source;

    assert!(out.contains("import { useState } from \"react\";\nimport { useService } from \"@weave/runtime\";\nimport { useEffect } from \"react\";\n"), "{out}");
    assert!(out.contains(
        "  useEffect(() => {\n    const controller = new AbortController();\n    todo.onMount?.({ signal: controller.signal });\n    return () => {\n      controller.abort();\n      todo.onUnmount?.();\n    };\n  }, []);\n  const [items] = useState([]);"
    ), "{out}");
}

#[test]
fn lifecycle_hooks_follow_registration_order() {
    let clock = "@Service()\nexport class SystemClock implements Clock {\n  onMount() {}\n}\n";
    let todo = "@Service()\nexport class TodoService implements TodoServiceInterface {\n  onMount() {}\n}\n";
    let card = "export function Card(props: { services: { todo: Inject<TodoServiceInterface>; clock: Inject<Clock> } }) {\n  return null;\n}\n";
    let result = run(
        &[
            CONTRACTS,
            ("src/SystemClock.ts", clock),
            ("src/TodoService.ts", todo),
            ("src/Card.tsx", card),
        ],
        "src/Card.tsx",
    );
    let out = &result.rewritten_source;

    let clock_mount = out.find("clock.onMount?.(").unwrap();
    let todo_mount = out.find("todo.onMount?.(").unwrap();
    assert!(clock_mount < todo_mount, "{out}");
}

#[test]
fn lifecycle_wiring_can_be_disabled() {
    let service = "@Service()\nexport class TodoService implements TodoServiceInterface {\n  onMount() {}\n}\n";
    let card = "export function Card(props: { services: { todo: Inject<TodoServiceInterface> } }) {\n  return null;\n}\n";
    let mut config = WeaveConfig::default();
    config.lifecycle.enabled = false;
    let result = run_with(
        &config,
        &[CONTRACTS, ("src/TodoService.ts", service), ("src/Card.tsx", card)],
        "src/Card.tsx",
    );
    assert!(!result.rewritten_source.contains("useEffect"));
}

#[test]
fn ambiguous_services_throw_lazily_and_are_reported() {
    let loggers = "@Service()\nclass A implements Logger {}\n@Service()\nclass B implements Logger {}\n";
    let view = "export function View(props: { services: { log: Inject<Logger> } }) {\n  return null;\n}\n";
    let result = run(
        &[CONTRACTS, ("src/loggers.ts", loggers), ("src/View.tsx", view)],
        "src/View.tsx",
    );
    assert!(result.rewritten_source.contains("throw new Error(\"Ambiguous implementations for Logger"));
    assert_eq!(result.diagnostics[0].kind, IssueKind::AmbiguousImplementation);
}

#[test]
fn transformation_is_idempotent() {
    let card = r#"import type { TodoServiceInterface } from "./contracts";

export const Card = ({ title, services }: { title: string; services: { todo: Inject<TodoServiceInterface> } }) => (
  <div>{title}{services.todo.list()}</div>
);
"#;
    let first = run(&[CONTRACTS, TODO_SERVICE, ("src/Card.tsx", card)], "src/Card.tsx");
    assert!(first.was_transformed);

    let second = run(
        &[CONTRACTS, TODO_SERVICE, ("src/Card.tsx", first.rewritten_source.as_str())],
        "src/Card.tsx",
    );
    assert!(!second.was_transformed, "{}", second.rewritten_source);
    assert_eq!(second.rewritten_source, first.rewritten_source);
    assert_eq!(second.resolved_bindings, first.resolved_bindings);
    assert_eq!(second.rewritten_source.matches("import { useService }").count(), 1);
}

#[test]
fn files_without_sites_are_untouched() {
    let result = run(&[CONTRACTS, TODO_SERVICE], "src/TodoService.ts");
    assert!(!result.was_transformed);
    assert_eq!(result.rewritten_source, TODO_SERVICE.1);
}
