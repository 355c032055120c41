//! Extraction for the languages served by the shared tree-sitter walk:
//! Rust, Go, Python, C, C++, Java.
//!
//! Coverage is intentionally shallower than the TypeScript front end: symbols
//! with parents and modifiers, import edges, and scope-attributed call edges.
//! Grammar differences are absorbed by per-kind match arms; anything
//! unrecognized just descends.

use super::{
    dotted_path, preceding_doc, range_of, signature_before_body, unquote, Ctx, DependencyDraft,
    Language,
};
use crate::types::{CallKind, DependencyKind, ImportedName, SymbolKind};
use tree_sitter::Node;

#[derive(Debug, Clone, Default)]
struct Parent {
    id: Option<String>,
    name: Option<String>,
}

pub(crate) fn extract(root: &Node, lang: Language, ctx: &mut Ctx) {
    visit(*root, lang, ctx, &Parent::default());
}

fn visit(node: Node, lang: Language, ctx: &mut Ctx, parent: &Parent) {
    match node.kind() {
        // --- imports -------------------------------------------------------
        "use_declaration" => handle_rust_use(node, ctx),
        "import_declaration" if lang == Language::Go => handle_go_import(node, ctx),
        "import_declaration" if lang == Language::Java => handle_java_import(node, ctx),
        "import_statement" | "import_from_statement" if lang == Language::Python => {
            handle_python_import(node, ctx)
        }
        "preproc_include" => handle_include(node, ctx),

        // --- functions and methods ----------------------------------------
        "function_item" => handle_function(node, lang, ctx, parent, "name"),
        "function_declaration" => handle_function(node, lang, ctx, parent, "name"),
        "function_definition" if lang == Language::Python => {
            handle_function(node, lang, ctx, parent, "name")
        }
        "function_definition" => handle_c_function(node, lang, ctx, parent),
        "method_declaration" if lang == Language::Go => handle_go_method(node, ctx),
        "method_declaration" if lang == Language::Java => {
            handle_function(node, lang, ctx, parent, "name")
        }
        "constructor_declaration" if lang == Language::Java => {
            handle_function(node, lang, ctx, parent, "name")
        }

        // --- type-level declarations --------------------------------------
        "struct_item" => handle_type(node, lang, ctx, parent, SymbolKind::Class, &["struct"]),
        "enum_item" => handle_rust_enum(node, ctx, parent),
        "trait_item" => handle_container(node, lang, ctx, parent, SymbolKind::Interface, &["trait"]),
        "impl_item" => handle_rust_impl(node, ctx),
        "type_item" | "type_definition" => {
            handle_type(node, lang, ctx, parent, SymbolKind::TypeAlias, &[])
        }
        "const_item" | "static_item" => {
            handle_type(node, lang, ctx, parent, SymbolKind::Variable, &["const"])
        }
        "mod_item" => handle_container(node, lang, ctx, parent, SymbolKind::Namespace, &[]),
        "class_definition" | "class_declaration" | "class_specifier" => {
            handle_container(node, lang, ctx, parent, SymbolKind::Class, &[])
        }
        "interface_declaration" => {
            handle_container(node, lang, ctx, parent, SymbolKind::Interface, &[])
        }
        "enum_declaration" if lang == Language::Java => handle_java_enum(node, ctx, parent),
        "struct_specifier" | "union_specifier" => {
            handle_c_struct(node, lang, ctx, parent);
        }
        "enum_specifier" => handle_c_enum(node, ctx, parent),
        "type_declaration" if lang == Language::Go => handle_go_types(node, ctx, parent),
        "namespace_definition" => {
            handle_container(node, lang, ctx, parent, SymbolKind::Namespace, &[])
        }
        "field_declaration" if lang == Language::Java => handle_java_field(node, ctx, parent),

        // --- calls ---------------------------------------------------------
        "call_expression" => handle_call(node, lang, ctx, parent),
        "call" if lang == Language::Python => handle_call(node, lang, ctx, parent),
        "method_invocation" => handle_java_invocation(node, ctx, parent),
        "object_creation_expression" => handle_java_new(node, ctx, parent),
        "new_expression" if lang == Language::Cpp => handle_cpp_new(node, ctx, parent),

        _ => visit_children(node, lang, ctx, parent),
    }
}

fn visit_children(node: Node, lang: Language, ctx: &mut Ctx, parent: &Parent) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit(child, lang, ctx, parent);
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn named(node: Node, ctx: &Ctx, field: &str) -> Option<String> {
    node.child_by_field_name(field).map(|n| ctx.text(n).to_string())
}

/// Find the id of an already-extracted type symbol by name (Rust impl blocks
/// and Go method receivers attach to the type declared earlier in the file).
fn find_type_id(ctx: &Ctx, name: &str) -> Option<String> {
    ctx.symbols
        .iter()
        .find(|s| {
            s.name == name
                && matches!(s.kind, SymbolKind::Class | SymbolKind::Interface | SymbolKind::Enum)
        })
        .map(|s| s.id.clone())
}

fn is_exported(node: Node, lang: Language, ctx: &Ctx, name: &str) -> bool {
    match lang {
        Language::Rust => {
            let mut cursor = node.walk();
            let x = node.children(&mut cursor)
                .any(|c| c.kind() == "visibility_modifier" && ctx.text(c).starts_with("pub"));
            x
        }
        Language::Go => name.chars().next().is_some_and(|c| c.is_uppercase()),
        Language::Python => !name.starts_with('_'),
        Language::Java => {
            let mut cursor = node.walk();
            let x = node.children(&mut cursor).any(|c| {
                c.kind() == "modifiers" && ctx.text(c).split_whitespace().any(|m| m == "public")
            });
            x
        }
        // C/C++: no syntactic exportedness; headers are the interface.
        Language::C | Language::Cpp => true,
        _ => false,
    }
}

fn modifier_tokens(node: Node, lang: Language, ctx: &Ctx) -> Vec<String> {
    let mut mods = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_modifiers" | "modifiers" => {
                for token in ctx.text(child).split_whitespace() {
                    if matches!(
                        token,
                        "async" | "static" | "public" | "private" | "protected" | "final"
                            | "abstract" | "const" | "unsafe" | "extern" | "synchronized"
                    ) {
                        mods.push(token.to_string());
                    }
                }
            }
            "async" => mods.push("async".to_string()),
            "static" => mods.push("static".to_string()),
            _ => {}
        }
    }
    if lang == Language::Python {
        // `async def` puts the keyword directly in the definition node.
        if ctx.text(node).trim_start().starts_with("async ") {
            mods.push("async".to_string());
        }
    }
    mods.dedup();
    mods
}

// ---------------------------------------------------------------------------
// Functions and methods
// ---------------------------------------------------------------------------

fn handle_function(node: Node, lang: Language, ctx: &mut Ctx, parent: &Parent, name_field: &str) {
    let Some(name) = named(node, ctx, name_field) else {
        return;
    };
    let kind = if parent.id.is_some() { SymbolKind::Method } else { SymbolKind::Function };
    let qualified = ctx.qualify(&name);
    let id = ctx.add_symbol(
        &name,
        &qualified,
        kind,
        range_of(node),
        is_exported(node, lang, ctx, &name),
        false,
        signature_before_body(node, ctx.src),
        preceding_doc(node, ctx.src),
        parent.id.clone(),
        modifier_tokens(node, lang, ctx),
    );
    if let Some(body) = node.child_by_field_name("body") {
        ctx.push_scope(qualified, Some(id));
        visit(body, lang, ctx, &Parent::default());
        ctx.pop_scope();
    }
}

/// C/C++ function definitions bury the name inside declarator chains.
fn handle_c_function(node: Node, lang: Language, ctx: &mut Ctx, parent: &Parent) {
    let mut decl = node.child_by_field_name("declarator");
    let mut name = None;
    while let Some(d) = decl {
        match d.kind() {
            "identifier" | "field_identifier" | "qualified_identifier" => {
                let text = ctx.text(d);
                name = Some(
                    text.rsplit("::").next().unwrap_or(text).trim().to_string(),
                );
                break;
            }
            _ => decl = d.child_by_field_name("declarator"),
        }
    }
    let Some(name) = name else {
        return visit_children(node, lang, ctx, parent);
    };
    let kind = if parent.id.is_some() { SymbolKind::Method } else { SymbolKind::Function };
    let qualified = ctx.qualify(&name);
    let id = ctx.add_symbol(
        &name,
        &qualified,
        kind,
        range_of(node),
        true,
        false,
        signature_before_body(node, ctx.src),
        preceding_doc(node, ctx.src),
        parent.id.clone(),
        Vec::new(),
    );
    if let Some(body) = node.child_by_field_name("body") {
        ctx.push_scope(qualified, Some(id));
        visit(body, lang, ctx, &Parent::default());
        ctx.pop_scope();
    }
}

fn handle_go_method(node: Node, ctx: &mut Ctx) {
    let Some(name) = named(node, ctx, "name") else {
        return;
    };
    // Receiver type names the logical container: `func (s *Server) Run()`.
    let receiver_type = node.child_by_field_name("receiver").and_then(|r| {
        let text = ctx.text(r);
        text.trim_matches(|c| c == '(' || c == ')')
            .split_whitespace()
            .last()
            .map(|t| t.trim_start_matches('*').to_string())
    });
    let parent_id = receiver_type.as_deref().and_then(|t| find_type_id(ctx, t));
    let qualified = match &receiver_type {
        Some(t) => format!("{t}.{name}"),
        None => name.clone(),
    };
    let id = ctx.add_symbol(
        &name,
        &qualified,
        SymbolKind::Method,
        range_of(node),
        is_exported(node, Language::Go, ctx, &name),
        false,
        signature_before_body(node, ctx.src),
        preceding_doc(node, ctx.src),
        parent_id,
        Vec::new(),
    );
    if let Some(body) = node.child_by_field_name("body") {
        ctx.push_scope(qualified, Some(id));
        visit(body, Language::Go, ctx, &Parent::default());
        ctx.pop_scope();
    }
}

// ---------------------------------------------------------------------------
// Type-level declarations
// ---------------------------------------------------------------------------

fn handle_type(
    node: Node,
    lang: Language,
    ctx: &mut Ctx,
    parent: &Parent,
    kind: SymbolKind,
    mods: &[&str],
) {
    let Some(name) = named(node, ctx, "name") else {
        return;
    };
    let mut modifiers: Vec<String> = mods.iter().map(|m| m.to_string()).collect();
    modifiers.extend(modifier_tokens(node, lang, ctx));
    let qualified = ctx.qualify(&name);
    ctx.add_symbol(
        &name,
        &qualified,
        kind,
        range_of(node),
        is_exported(node, lang, ctx, &name),
        false,
        None,
        preceding_doc(node, ctx.src),
        parent.id.clone(),
        modifiers,
    );
}

/// Containers whose members should carry a parent id: classes, traits,
/// interfaces, namespaces, modules.
fn handle_container(
    node: Node,
    lang: Language,
    ctx: &mut Ctx,
    parent: &Parent,
    kind: SymbolKind,
    mods: &[&str],
) {
    let Some(name) = named(node, ctx, "name") else {
        return visit_children(node, lang, ctx, parent);
    };
    let mut modifiers: Vec<String> = mods.iter().map(|m| m.to_string()).collect();
    modifiers.extend(modifier_tokens(node, lang, ctx));
    let qualified = ctx.qualify(&name);
    let id = ctx.add_symbol(
        &name,
        &qualified,
        kind,
        range_of(node),
        is_exported(node, lang, ctx, &name),
        false,
        signature_before_body(node, ctx.src),
        preceding_doc(node, ctx.src),
        parent.id.clone(),
        modifiers,
    );
    if let Some(body) = node.child_by_field_name("body") {
        let next = Parent { id: Some(id), name: Some(name.clone()) };
        ctx.push_scope(name, None);
        visit_children(body, lang, ctx, &next);
        ctx.pop_scope();
    }
}

fn handle_rust_enum(node: Node, ctx: &mut Ctx, parent: &Parent) {
    let Some(name) = named(node, ctx, "name") else {
        return;
    };
    let qualified = ctx.qualify(&name);
    let id = ctx.add_symbol(
        &name,
        &qualified,
        SymbolKind::Enum,
        range_of(node),
        is_exported(node, Language::Rust, ctx, &name),
        false,
        None,
        preceding_doc(node, ctx.src),
        parent.id.clone(),
        Vec::new(),
    );
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for variant in body.children(&mut cursor) {
            if variant.kind() == "enum_variant" {
                if let Some(vname) = named(variant, ctx, "name") {
                    let vq = format!("{qualified}.{vname}");
                    ctx.add_symbol(
                        &vname,
                        &vq,
                        SymbolKind::EnumMember,
                        range_of(variant),
                        false,
                        false,
                        None,
                        None,
                        Some(id.clone()),
                        Vec::new(),
                    );
                }
            }
        }
    }
}

fn handle_rust_impl(node: Node, ctx: &mut Ctx) {
    // `impl Type` / `impl Trait for Type` — methods attach to Type's symbol.
    let type_name = node
        .child_by_field_name("type")
        .map(|t| ctx.text(t).trim().to_string());
    let Some(type_name) = type_name else {
        return;
    };
    let base = type_name.split('<').next().unwrap_or(&type_name).trim().to_string();
    let parent = Parent { id: find_type_id(ctx, &base), name: Some(base.clone()) };
    if let Some(body) = node.child_by_field_name("body") {
        ctx.push_scope(base, None);
        visit_children(body, Language::Rust, ctx, &parent);
        ctx.pop_scope();
    }
}

fn handle_go_types(node: Node, ctx: &mut Ctx, parent: &Parent) {
    let mut cursor = node.walk();
    for spec in node.children(&mut cursor) {
        if spec.kind() != "type_spec" {
            continue;
        }
        let Some(name) = named(spec, ctx, "name") else {
            continue;
        };
        let kind = match spec.child_by_field_name("type").map(|t| t.kind()) {
            Some("struct_type") => SymbolKind::Class,
            Some("interface_type") => SymbolKind::Interface,
            _ => SymbolKind::TypeAlias,
        };
        let mods: &[&str] = if kind == SymbolKind::Class { &["struct"] } else { &[] };
        let qualified = ctx.qualify(&name);
        ctx.add_symbol(
            &name,
            &qualified,
            kind,
            range_of(spec),
            is_exported(spec, Language::Go, ctx, &name),
            false,
            None,
            preceding_doc(node, ctx.src),
            parent.id.clone(),
            mods.iter().map(|m| m.to_string()).collect(),
        );
    }
}

fn handle_c_struct(node: Node, lang: Language, ctx: &mut Ctx, parent: &Parent) {
    // Only named definitions with bodies become symbols; bare references
    // (`struct foo x;`) descend.
    let name = named(node, ctx, "name");
    let body = node.child_by_field_name("body");
    match (name, body) {
        (Some(name), Some(body)) => {
            let qualified = ctx.qualify(&name);
            let id = ctx.add_symbol(
                &name,
                &qualified,
                SymbolKind::Class,
                range_of(node),
                true,
                false,
                None,
                preceding_doc(node, ctx.src),
                parent.id.clone(),
                vec!["struct".to_string()],
            );
            let next = Parent { id: Some(id), name: Some(name.clone()) };
            ctx.push_scope(name, None);
            visit_children(body, lang, ctx, &next);
            ctx.pop_scope();
        }
        _ => visit_children(node, lang, ctx, parent),
    }
}

fn handle_c_enum(node: Node, ctx: &mut Ctx, parent: &Parent) {
    let Some(name) = named(node, ctx, "name") else {
        return;
    };
    let qualified = ctx.qualify(&name);
    let id = ctx.add_symbol(
        &name,
        &qualified,
        SymbolKind::Enum,
        range_of(node),
        true,
        false,
        None,
        preceding_doc(node, ctx.src),
        parent.id.clone(),
        Vec::new(),
    );
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for member in body.children(&mut cursor) {
            if member.kind() == "enumerator" {
                if let Some(mname) = named(member, ctx, "name") {
                    let mq = format!("{qualified}.{mname}");
                    ctx.add_symbol(
                        &mname,
                        &mq,
                        SymbolKind::EnumMember,
                        range_of(member),
                        true,
                        false,
                        None,
                        None,
                        Some(id.clone()),
                        Vec::new(),
                    );
                }
            }
        }
    }
}

fn handle_java_enum(node: Node, ctx: &mut Ctx, parent: &Parent) {
    let Some(name) = named(node, ctx, "name") else {
        return;
    };
    let qualified = ctx.qualify(&name);
    let id = ctx.add_symbol(
        &name,
        &qualified,
        SymbolKind::Enum,
        range_of(node),
        is_exported(node, Language::Java, ctx, &name),
        false,
        None,
        preceding_doc(node, ctx.src),
        parent.id.clone(),
        Vec::new(),
    );
    if let Some(body) = node.child_by_field_name("body") {
        let next = Parent { id: Some(id.clone()), name: Some(name.clone()) };
        let mut cursor = body.walk();
        for member in body.children(&mut cursor) {
            if member.kind() == "enum_constant" {
                if let Some(mname) = named(member, ctx, "name") {
                    let mq = format!("{qualified}.{mname}");
                    ctx.add_symbol(
                        &mname,
                        &mq,
                        SymbolKind::EnumMember,
                        range_of(member),
                        true,
                        false,
                        None,
                        None,
                        Some(id.clone()),
                        Vec::new(),
                    );
                }
            } else {
                visit(member, Language::Java, ctx, &next);
            }
        }
    }
}

fn handle_java_field(node: Node, ctx: &mut Ctx, parent: &Parent) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "variable_declarator" {
            if let Some(name) = named(child, ctx, "name") {
                let qualified = ctx.qualify(&name);
                ctx.add_symbol(
                    &name,
                    &qualified,
                    SymbolKind::Property,
                    range_of(node),
                    is_exported(node, Language::Java, ctx, &name),
                    false,
                    None,
                    preceding_doc(node, ctx.src),
                    parent.id.clone(),
                    modifier_tokens(node, Language::Java, ctx),
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Imports
// ---------------------------------------------------------------------------

fn handle_rust_use(node: Node, ctx: &mut Ctx) {
    if let Some(arg) = node.child_by_field_name("argument") {
        let target = ctx.text(arg).trim().to_string();
        ctx.add_dependency(DependencyDraft {
            target,
            kind: DependencyKind::Import,
            names: Vec::new(),
            line: node.start_position().row + 1,
        });
    }
}

fn handle_go_import(node: Node, ctx: &mut Ctx) {
    fn spec(node: Node, ctx: &mut Ctx) {
        let Some(path) = node.child_by_field_name("path") else {
            return;
        };
        let target = unquote(ctx.text(path));
        let alias = node.child_by_field_name("name").map(|n| ctx.text(n).to_string());
        let names = alias
            .map(|a| {
                vec![ImportedName { name: a.clone(), alias: Some(a), is_namespace: true, ..Default::default() }]
            })
            .unwrap_or_default();
        ctx.add_dependency(DependencyDraft {
            target,
            kind: DependencyKind::Import,
            names,
            line: node.start_position().row + 1,
        });
    }
    let mut cursor = node.walk();
    let specs: Vec<Node> = node
        .children(&mut cursor)
        .flat_map(|c| {
            if c.kind() == "import_spec" {
                vec![c]
            } else if c.kind() == "import_spec_list" {
                let mut inner = c.walk();
                c.children(&mut inner).filter(|s| s.kind() == "import_spec").collect()
            } else {
                Vec::new()
            }
        })
        .collect();
    for s in specs {
        spec(s, ctx);
    }
}

fn handle_java_import(node: Node, ctx: &mut Ctx) {
    let mut cursor = node.walk();
    let target = node
        .children(&mut cursor)
        .find(|c| matches!(c.kind(), "scoped_identifier" | "identifier"))
        .map(|c| ctx.text(c).to_string());
    if let Some(target) = target {
        ctx.add_dependency(DependencyDraft {
            target,
            kind: DependencyKind::Import,
            names: Vec::new(),
            line: node.start_position().row + 1,
        });
    }
}

fn handle_python_import(node: Node, ctx: &mut Ctx) {
    let line = node.start_position().row + 1;
    if node.kind() == "import_from_statement" {
        let Some(module) = node.child_by_field_name("module_name") else {
            return;
        };
        let target = ctx.text(module).to_string();
        let mut names = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "dotted_name" if child.range() != module.range() => names.push(ImportedName {
                    name: ctx.text(child).to_string(),
                    ..Default::default()
                }),
                "aliased_import" => {
                    let name = named(child, ctx, "name").unwrap_or_default();
                    let alias = named(child, ctx, "alias");
                    names.push(ImportedName { name, alias, ..Default::default() });
                }
                "wildcard_import" => names.push(ImportedName {
                    name: "*".to_string(),
                    is_namespace: true,
                    ..Default::default()
                }),
                _ => {}
            }
        }
        ctx.add_dependency(DependencyDraft { target, kind: DependencyKind::Import, names, line });
        return;
    }

    // plain `import a.b, c as d`
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "dotted_name" => {
                let target = ctx.text(child).to_string();
                ctx.add_dependency(DependencyDraft {
                    target,
                    kind: DependencyKind::Import,
                    names: Vec::new(),
                    line,
                });
            }
            "aliased_import" => {
                let target = named(child, ctx, "name").unwrap_or_default();
                let alias = named(child, ctx, "alias");
                ctx.add_dependency(DependencyDraft {
                    target: target.clone(),
                    kind: DependencyKind::Import,
                    names: vec![ImportedName { name: target, alias, ..Default::default() }],
                    line,
                });
            }
            _ => {}
        }
    }
}

fn handle_include(node: Node, ctx: &mut Ctx) {
    let mut cursor = node.walk();
    let path = node
        .children(&mut cursor)
        .find(|c| matches!(c.kind(), "string_literal" | "system_lib_string"))
        .map(|c| (c.kind() == "system_lib_string", ctx.text(c).to_string()));
    if let Some((_system, raw)) = path {
        let target = raw.trim_matches(|c| c == '"' || c == '<' || c == '>').to_string();
        ctx.add_dependency(DependencyDraft {
            target,
            kind: DependencyKind::Import,
            names: Vec::new(),
            line: node.start_position().row + 1,
        });
    }
}

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

fn handle_call(node: Node, lang: Language, ctx: &mut Ctx, parent: &Parent) {
    let line = node.start_position().row + 1;
    let column = node.start_position().column;
    let arg_count = node
        .child_by_field_name("arguments")
        .map(|a| a.named_child_count())
        .unwrap_or(0);

    if let Some(func) = node.child_by_field_name("function") {
        match func.kind() {
            "identifier" => {
                ctx.add_call(
                    ctx.text(func).to_string(),
                    line,
                    column,
                    CallKind::Function,
                    false,
                    None,
                    arg_count,
                );
            }
            // Rust paths (`config::load`), C++ qualified names
            "scoped_identifier" | "qualified_identifier" => {
                let text = ctx.text(func);
                let name = text.rsplit("::").next().unwrap_or(text).trim();
                if !name.is_empty() {
                    ctx.add_call(
                        name.to_string(),
                        line,
                        column,
                        CallKind::Function,
                        false,
                        None,
                        arg_count,
                    );
                }
            }
            // method calls: Rust field_expression, Go selector, Python attribute
            "field_expression" | "selector_expression" | "attribute" => {
                let prop = func
                    .child_by_field_name("field")
                    .or_else(|| func.child_by_field_name("attribute"))
                    .or_else(|| func.child_by_field_name("property"));
                let obj = func
                    .child_by_field_name("value")
                    .or_else(|| func.child_by_field_name("operand"))
                    .or_else(|| func.child_by_field_name("object"));
                if let Some(prop) = prop {
                    let receiver = obj.map(|o| dotted_path(o, ctx.src)).filter(|r| !r.is_empty());
                    ctx.add_call(
                        ctx.text(prop).to_string(),
                        line,
                        column,
                        CallKind::Method,
                        true,
                        receiver,
                        arg_count,
                    );
                }
            }
            _ => {}
        }
    }

    visit_children(node, lang, ctx, parent);
}

fn handle_java_invocation(node: Node, ctx: &mut Ctx, parent: &Parent) {
    let line = node.start_position().row + 1;
    let column = node.start_position().column;
    let arg_count = node
        .child_by_field_name("arguments")
        .map(|a| a.named_child_count())
        .unwrap_or(0);
    if let Some(name) = named(node, ctx, "name") {
        let receiver = node
            .child_by_field_name("object")
            .map(|o| dotted_path(o, ctx.src))
            .filter(|r| !r.is_empty());
        let is_method = receiver.is_some();
        ctx.add_call(
            name,
            line,
            column,
            if is_method { CallKind::Method } else { CallKind::Function },
            is_method,
            receiver,
            arg_count,
        );
    }
    visit_children(node, Language::Java, ctx, parent);
}

fn handle_java_new(node: Node, ctx: &mut Ctx, parent: &Parent) {
    let line = node.start_position().row + 1;
    let column = node.start_position().column;
    let arg_count = node
        .child_by_field_name("arguments")
        .map(|a| a.named_child_count())
        .unwrap_or(0);
    if let Some(type_name) = named(node, ctx, "type") {
        let base = type_name.split('<').next().unwrap_or(&type_name).trim().to_string();
        ctx.add_call(base, line, column, CallKind::Constructor, false, None, arg_count);
    }
    visit_children(node, Language::Java, ctx, parent);
}

fn handle_cpp_new(node: Node, ctx: &mut Ctx, parent: &Parent) {
    let line = node.start_position().row + 1;
    let column = node.start_position().column;
    if let Some(type_name) = named(node, ctx, "type") {
        ctx.add_call(type_name, line, column, CallKind::Constructor, false, None, 0);
    }
    visit_children(node, Language::Cpp, ctx, parent);
}

#[cfg(test)]
mod tests {
    use crate::extract::extract;
    use crate::types::{CallKind, DependencyKind, SymbolKind};

    #[test]
    fn test_rust_symbols_and_calls() {
        let out = extract(
            r#"
use std::collections::HashMap;

/// Engine configuration.
pub struct Config {
    pub name: String,
}

pub enum Status { Ok, Degraded }

impl Config {
    pub fn load(path: &str) -> Self {
        let raw = read_file(path);
        parse(raw)
    }
}

fn read_file(path: &str) -> String { String::new() }
"#,
            "/repo/src/config.rs",
            "src/config.rs",
            "rs",
        );

        let config = out.symbols.iter().find(|s| s.name == "Config").unwrap();
        assert_eq!(config.kind, SymbolKind::Class);
        assert!(config.is_exported);
        assert_eq!(config.documentation.as_deref(), Some("Engine configuration."));

        let load = out.symbols.iter().find(|s| s.name == "load").unwrap();
        assert_eq!(load.kind, SymbolKind::Method);
        assert_eq!(load.parent_id.as_deref(), Some(config.id.as_str()));

        assert!(out
            .symbols
            .iter()
            .any(|s| s.kind == SymbolKind::EnumMember && s.name == "Degraded"));

        let dep = out.dependencies.iter().find(|d| d.kind == DependencyKind::Import).unwrap();
        assert!(dep.target.contains("HashMap"));

        let call = out.calls.iter().find(|c| c.callee_name == "read_file").unwrap();
        assert_eq!(call.caller_name.as_deref(), Some("Config.load"));
        assert!(call.callee_id.is_some(), "same-file call should resolve");
    }

    #[test]
    fn test_go_method_receiver() {
        let out = extract(
            r#"
package server

import (
    "fmt"
    logpkg "log"
)

type Server struct{}

func (s *Server) Run() {
    s.setup()
    fmt.Println("up")
}

func (s *Server) setup() {}
"#,
            "/repo/server.go",
            "server.go",
            "go",
        );
        let server = out.symbols.iter().find(|s| s.name == "Server").unwrap();
        assert_eq!(server.kind, SymbolKind::Class);

        let run = out.symbols.iter().find(|s| s.name == "Run").unwrap();
        assert_eq!(run.kind, SymbolKind::Method);
        assert_eq!(run.parent_id.as_deref(), Some(server.id.as_str()));
        assert!(run.is_exported);

        let setup = out.symbols.iter().find(|s| s.name == "setup").unwrap();
        assert!(!setup.is_exported);

        assert!(out.dependencies.iter().any(|d| d.target == "fmt"));
        assert!(out
            .dependencies
            .iter()
            .any(|d| d.target == "log" && d.names.iter().any(|n| n.name == "logpkg")));

        let call = out.calls.iter().find(|c| c.callee_name == "setup").unwrap();
        assert_eq!(call.caller_name.as_deref(), Some("Server.Run"));
        assert!(call.is_method_call);
        assert_eq!(call.receiver.as_deref(), Some("s"));
    }

    #[test]
    fn test_python_class_and_imports() {
        let out = extract(
            r#"
import os
from pathlib import Path as P

class Walker:
    def run(self):
        return self._scan()

    def _scan(self):
        return os.listdir(".")
"#,
            "/repo/walker.py",
            "walker.py",
            "py",
        );
        let walker = out.symbols.iter().find(|s| s.name == "Walker").unwrap();
        let run = out.symbols.iter().find(|s| s.name == "run").unwrap();
        assert_eq!(run.parent_id.as_deref(), Some(walker.id.as_str()));
        assert!(run.is_exported);
        let scan = out.symbols.iter().find(|s| s.name == "_scan").unwrap();
        assert!(!scan.is_exported);

        assert!(out.dependencies.iter().any(|d| d.target == "os"));
        let from = out.dependencies.iter().find(|d| d.target == "pathlib").unwrap();
        assert!(from
            .names
            .iter()
            .any(|n| n.name == "Path" && n.alias.as_deref() == Some("P")));

        let call = out.calls.iter().find(|c| c.callee_name == "_scan").unwrap();
        assert_eq!(call.caller_name.as_deref(), Some("Walker.run"));
    }

    #[test]
    fn test_java_class_and_constructor_call() {
        let out = extract(
            r#"
import java.util.List;

public class Registry {
    private List<String> entries;

    public Registry() {
        this.entries = new ArrayList(10);
    }

    public void add(String entry) {
        entries.add(entry);
    }
}
"#,
            "/repo/Registry.java",
            "Registry.java",
            "java",
        );
        let registry = out.symbols.iter().find(|s| s.name == "Registry" && s.kind == SymbolKind::Class).unwrap();
        assert!(registry.is_exported);
        let field = out.symbols.iter().find(|s| s.name == "entries").unwrap();
        assert_eq!(field.kind, SymbolKind::Property);
        assert_eq!(field.parent_id.as_deref(), Some(registry.id.as_str()));

        assert!(out.dependencies.iter().any(|d| d.target == "java.util.List"));

        let ctor = out.calls.iter().find(|c| c.kind == CallKind::Constructor).unwrap();
        assert_eq!(ctor.callee_name, "ArrayList");
        assert_eq!(ctor.arg_count, 1);
    }

    #[test]
    fn test_c_include_and_function() {
        let out = extract(
            r#"
#include <stdio.h>
#include "util.h"

int main(int argc, char **argv) {
    helper(argc);
    return 0;
}
"#,
            "/repo/main.c",
            "main.c",
            "c",
        );
        assert!(out.dependencies.iter().any(|d| d.target == "stdio.h"));
        assert!(out.dependencies.iter().any(|d| d.target == "util.h"));
        let main = out.symbols.iter().find(|s| s.name == "main").unwrap();
        assert_eq!(main.kind, SymbolKind::Function);
        let call = out.calls.iter().find(|c| c.callee_name == "helper").unwrap();
        assert_eq!(call.caller_name.as_deref(), Some("main"));
    }
}
