//! Text of the generated statements.

use weave_config::WeaveConfig;

use crate::key::ResolutionKey;

/// How a binding obtains its value when the parent did not pass one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Fallback {
    Lookup(ResolutionKey),
    OptionalLookup(ResolutionKey),
    /// Throws on first property read, naming the problem.
    Throwing(String),
    Undefined,
}

/// JavaScript string literal for `value`.
///
/// JSON string syntax is a subset of JavaScript's, so serde_json's escaping is reused.
pub(crate) fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value.escape_default()))
}

pub(crate) fn fallback_expr(config: &WeaveConfig, fallback: &Fallback) -> String {
    match fallback {
        Fallback::Lookup(key) => format!("{}({})", config.runtime.lookup, js_string(key.as_str())),
        Fallback::OptionalLookup(key) => format!(
            "{}({})",
            config.runtime.optional_lookup,
            js_string(key.as_str())
        ),
        Fallback::Throwing(message) => format!(
            "new Proxy({{}}, {{ get() {{ throw new Error({}); }} }})",
            js_string(message)
        ),
        Fallback::Undefined => "undefined".to_string(),
    }
}

/// `const todo = props.services?.todo ?? useService("Key");`
pub(crate) fn binding(
    local: &str,
    param: &str,
    services: &str,
    property: &str,
    fallback: Option<&str>,
) -> String {
    let access = format!("{param}.{services}?.{}", member(property));
    match fallback {
        Some(fallback) => format!("const {local} = {access} ?? {fallback};"),
        None => format!("const {local} = {access};"),
    }
}

/// Property access suffix: `todo`, or `["my-service"]` after `?.`.
fn member(property: &str) -> String {
    if is_identifier(property) {
        property.to_string()
    } else {
        format!("[{}]", js_string(property))
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// `{ ...props.services, todo, api: api_ }`
pub(crate) fn services_object(param: &str, services: &str, entries: &[(&str, &str)]) -> String {
    let mut parts = vec![format!("...{param}.{services}")];
    for (property, local) in entries {
        if property == local {
            parts.push(local.to_string());
        } else if is_identifier(property) {
            parts.push(format!("{property}: {local}"));
        } else {
            parts.push(format!("{}: {local}", js_string(property)));
        }
    }
    format!("{{ {} }}", parts.join(", "))
}

/// A service wired into a component that declares lifecycle hooks.
pub(crate) struct HookTarget<'a> {
    pub local: &'a str,
    pub on_mount: bool,
    pub on_unmount: bool,
}

/// One `useEffect` running every mount hook with an abort signal, and in
/// cleanup aborting before every unmount hook.
pub(crate) fn lifecycle_effect(
    config: &WeaveConfig,
    targets: &[HookTarget<'_>],
    controller: &str,
    indent: &str,
) -> String {
    let inner = format!("{indent}  ");
    let mut lines = vec![
        format!("{}(() => {{", config.lifecycle.effect_hook),
        format!("{inner}const {controller} = new AbortController();"),
    ];
    for target in targets.iter().filter(|t| t.on_mount) {
        lines.push(format!(
            "{inner}{}.{}?.({{ signal: {controller}.signal }});",
            target.local, config.lifecycle.mount
        ));
    }
    lines.push(format!("{inner}return () => {{"));
    lines.push(format!("{inner}  {controller}.abort();"));
    for target in targets.iter().filter(|t| t.on_unmount) {
        lines.push(format!(
            "{inner}  {}.{}?.();",
            target.local, config.lifecycle.unmount
        ));
    }
    lines.push(format!("{inner}}};"));
    lines.push(format!("{indent}}}, []);"));
    lines.join("\n")
}

/// `import { a, b } from "module";`
pub(crate) fn import_declaration(names: &[&str], module: &str) -> String {
    format!("import {{ {} }} from {};", names.join(", "), js_string(module))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bindings_use_optional_chaining_and_fallback() {
        assert_eq!(
            binding("todo", "props", "services", "todo", Some("useService(\"Todo\")")),
            "const todo = props.services?.todo ?? useService(\"Todo\");"
        );
        assert_eq!(
            binding("api", "p", "services", "my-api", None),
            "const api = p.services?.[\"my-api\"];"
        );
    }

    #[test]
    fn throwing_fallback_escapes_message() {
        let config = WeaveConfig::default();
        let expr = fallback_expr(&config, &Fallback::Throwing("no \"Api\"".to_string()));
        assert_eq!(
            expr,
            r#"new Proxy({}, { get() { throw new Error("no \"Api\""); } })"#
        );
    }

    #[test]
    fn services_object_merges_bindings() {
        assert_eq!(
            services_object("props", "services", &[("todo", "todo"), ("api", "api_")]),
            "{ ...props.services, todo, api: api_ }"
        );
    }

    #[test]
    fn lifecycle_effect_aborts_before_unmount() {
        let config = WeaveConfig::default();
        let effect = lifecycle_effect(
            &config,
            &[
                HookTarget {
                    local: "todo",
                    on_mount: true,
                    on_unmount: true,
                },
                HookTarget {
                    local: "clock",
                    on_mount: false,
                    on_unmount: true,
                },
            ],
            "controller",
            "  ",
        );
        assert_eq!(
            effect,
            [
                "useEffect(() => {",
                "    const controller = new AbortController();",
                "    todo.onMount?.({ signal: controller.signal });",
                "    return () => {",
                "      controller.abort();",
                "      todo.onUnmount?.();",
                "      clock.onUnmount?.();",
                "    };",
                "  }, []);",
            ]
            .join("\n")
        );
    }
}
