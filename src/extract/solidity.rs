//! Solidity extraction: contracts, libraries, interfaces, their members,
//! events, custom errors, imports, and call edges.
//!
//! Contract-like declarations map onto the shared schema as classes (with
//! `library`/`interface`/`abstract` modifier tokens), so downstream queries
//! treat them uniformly with the other object languages.

use super::{preceding_doc, range_of, signature_before_body, unquote, Ctx, DependencyDraft};
use crate::types::{CallKind, DependencyKind, ImportedName, SymbolKind};
use tree_sitter::Node;

#[derive(Debug, Clone, Default)]
struct Parent {
    id: Option<String>,
    name: Option<String>,
}

pub(crate) fn extract(root: &Node, ctx: &mut Ctx) {
    visit(*root, ctx, &Parent::default());
}

fn visit(node: Node, ctx: &mut Ctx, parent: &Parent) {
    match node.kind() {
        "import_directive" => handle_import(node, ctx),
        "contract_declaration" => handle_contract(node, ctx, SymbolKind::Class, &[]),
        "library_declaration" => handle_contract(node, ctx, SymbolKind::Class, &["library"]),
        "interface_declaration" => handle_contract(node, ctx, SymbolKind::Interface, &[]),
        "function_definition" => handle_function(node, ctx, parent, None),
        "constructor_definition" => handle_function(node, ctx, parent, Some("constructor")),
        "fallback_receive_definition" => {
            let name = if ctx.text(node).trim_start().starts_with("receive") {
                "receive"
            } else {
                "fallback"
            };
            handle_function(node, ctx, parent, Some(name));
        }
        "modifier_definition" => handle_modifier(node, ctx, parent),
        "event_definition" => handle_event(node, ctx, parent, false),
        "error_declaration" => handle_event(node, ctx, parent, true),
        "state_variable_declaration" => handle_state_variable(node, ctx, parent),
        "struct_declaration" => handle_struct(node, ctx, parent),
        "enum_declaration" => handle_enum(node, ctx, parent),
        "call_expression" => handle_call(node, ctx, parent),
        "emit_statement" => handle_emit(node, ctx, parent),
        _ => visit_children(node, ctx, parent),
    }
}

fn visit_children(node: Node, ctx: &mut Ctx, parent: &Parent) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit(child, ctx, parent);
    }
}

/// `name` field, or the first identifier child as a fallback.
fn name_of(node: Node, ctx: &Ctx) -> Option<String> {
    if let Some(n) = node.child_by_field_name("name") {
        return Some(ctx.text(n).to_string());
    }
    let mut cursor = node.walk();
    let x = node.children(&mut cursor)
        .find(|c| c.kind() == "identifier")
        .map(|n| ctx.text(n).to_string());
    x
}

fn has_token(node: Node, ctx: &Ctx, token: &str) -> bool {
    let mut cursor = node.walk();
    node.children(&mut cursor).any(|c| ctx.text(c) == token && c.child_count() == 0)
        || {
            let mut cursor = node.walk();
            let x = node.children(&mut cursor).any(|c| {
                matches!(c.kind(), "visibility" | "state_mutability") && ctx.text(c) == token
            });
            x
        }
}

fn collect_modifiers(node: Node, ctx: &Ctx) -> Vec<String> {
    let mut mods = Vec::new();
    for token in
        ["public", "private", "internal", "external", "view", "pure", "payable", "virtual",
            "override", "constant", "immutable", "abstract"]
    {
        if has_token(node, ctx, token) {
            mods.push(token.to_string());
        }
    }
    mods
}

// ---------------------------------------------------------------------------
// Imports
// ---------------------------------------------------------------------------

fn handle_import(node: Node, ctx: &mut Ctx) {
    let line = node.start_position().row + 1;
    let mut target = None;
    let mut names: Vec<ImportedName> = Vec::new();
    let mut saw_star = false;

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "string" => target = Some(unquote(ctx.text(child))),
            "*" => saw_star = true,
            "identifier" => {
                // `import * as ns from "..."` or plain alias
                names.push(ImportedName {
                    name: ctx.text(child).to_string(),
                    is_namespace: saw_star,
                    ..Default::default()
                });
            }
            _ => {
                // Named clause: `import {A as B} from "..."` — specifiers hold
                // identifier pairs.
                let mut inner = child.walk();
                let idents: Vec<String> = child
                    .children(&mut inner)
                    .flat_map(|spec| {
                        let mut ids = Vec::new();
                        if spec.kind() == "identifier" {
                            ids.push(ctx.text(spec).to_string());
                        } else {
                            let mut sc = spec.walk();
                            for part in spec.children(&mut sc) {
                                if part.kind() == "identifier" {
                                    ids.push(ctx.text(part).to_string());
                                }
                            }
                        }
                        ids
                    })
                    .collect();
                for pair in idents.chunks(2) {
                    match pair {
                        [name, alias] => names.push(ImportedName {
                            name: name.clone(),
                            alias: Some(alias.clone()),
                            ..Default::default()
                        }),
                        [name] => names.push(ImportedName {
                            name: name.clone(),
                            ..Default::default()
                        }),
                        _ => {}
                    }
                }
            }
        }
    }

    if let Some(target) = target {
        ctx.add_dependency(DependencyDraft {
            target: target.clone(),
            kind: DependencyKind::Import,
            names,
            line,
        });
        let qualified = format!("{target}@{line}");
        ctx.add_symbol(
            &target,
            &qualified,
            SymbolKind::Import,
            range_of(node),
            false,
            false,
            None,
            None,
            None,
            Vec::new(),
        );
    }
}

// ---------------------------------------------------------------------------
// Contract-like declarations
// ---------------------------------------------------------------------------

fn handle_contract(node: Node, ctx: &mut Ctx, kind: SymbolKind, extra_mods: &[&str]) {
    let Some(name) = name_of(node, ctx) else {
        return;
    };
    let mut modifiers: Vec<String> = extra_mods.iter().map(|m| m.to_string()).collect();
    if has_token(node, ctx, "abstract") && !modifiers.iter().any(|m| m == "abstract") {
        modifiers.push("abstract".to_string());
    }
    if kind == SymbolKind::Interface {
        modifiers.push("interface".to_string());
    }

    let id = ctx.add_symbol(
        &name,
        &name,
        kind,
        range_of(node),
        true,
        false,
        signature_before_body(node, ctx.src),
        preceding_doc(node, ctx.src),
        None,
        modifiers,
    );

    let parent = Parent { id: Some(id), name: Some(name.clone()) };
    let body = node
        .child_by_field_name("body")
        .or_else(|| {
            let mut cursor = node.walk();
            let x = node.children(&mut cursor).find(|c| c.kind().ends_with("_body"));
            x
        });
    if let Some(body) = body {
        ctx.push_scope(name, None);
        visit_children(body, ctx, &parent);
        ctx.pop_scope();
    }
}

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

fn handle_function(node: Node, ctx: &mut Ctx, parent: &Parent, fixed_name: Option<&str>) {
    let name = match fixed_name {
        Some(n) => n.to_string(),
        None => match name_of(node, ctx) {
            Some(n) => n,
            None => return,
        },
    };
    let mut modifiers = collect_modifiers(node, ctx);
    if fixed_name == Some("constructor") {
        modifiers.push("constructor".to_string());
    }
    let exported = modifiers.iter().any(|m| m == "public" || m == "external");

    let kind = if parent.id.is_some() { SymbolKind::Method } else { SymbolKind::Function };
    let qualified = ctx.qualify(&name);
    let id = ctx.add_symbol(
        &name,
        &qualified,
        kind,
        range_of(node),
        exported || parent.id.is_none(),
        false,
        signature_before_body(node, ctx.src),
        preceding_doc(node, ctx.src),
        parent.id.clone(),
        modifiers,
    );

    // Modifier invocations in the header are call sites of the modifiers.
    let header_calls = modifier_invocations(node, ctx);
    ctx.push_scope(qualified, Some(id));
    for (name, line, column, arg_count) in header_calls {
        ctx.add_call(name, line, column, CallKind::Function, false, None, arg_count);
    }
    if let Some(body) = node.child_by_field_name("body") {
        visit_children(body, ctx, &Parent::default());
    }
    ctx.pop_scope();
}

fn modifier_invocations(node: Node, ctx: &Ctx) -> Vec<(String, usize, usize, usize)> {
    let mut out = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "modifier_invocation" {
            if let Some(name) = name_of(child, ctx) {
                let args = {
                    let mut inner = child.walk();
                    child
                        .children(&mut inner)
                        .filter(|c| c.kind() == "call_argument")
                        .count()
                };
                out.push((
                    name,
                    child.start_position().row + 1,
                    child.start_position().column,
                    args,
                ));
            }
        }
    }
    out
}

fn handle_modifier(node: Node, ctx: &mut Ctx, parent: &Parent) {
    let Some(name) = name_of(node, ctx) else {
        return;
    };
    let qualified = ctx.qualify(&name);
    let id = ctx.add_symbol(
        &name,
        &qualified,
        SymbolKind::Function,
        range_of(node),
        false,
        false,
        signature_before_body(node, ctx.src),
        preceding_doc(node, ctx.src),
        parent.id.clone(),
        vec!["modifier".to_string()],
    );
    ctx.push_scope(qualified, Some(id));
    if let Some(body) = node.child_by_field_name("body") {
        visit_children(body, ctx, &Parent::default());
    }
    ctx.pop_scope();
}

fn handle_event(node: Node, ctx: &mut Ctx, parent: &Parent, is_error: bool) {
    let Some(name) = name_of(node, ctx) else {
        return;
    };
    let modifiers = if is_error { vec!["error".to_string()] } else { Vec::new() };
    let qualified = ctx.qualify(&name);
    ctx.add_symbol(
        &name,
        &qualified,
        SymbolKind::Event,
        range_of(node),
        true,
        false,
        signature_before_body(node, ctx.src),
        preceding_doc(node, ctx.src),
        parent.id.clone(),
        modifiers,
    );
}

fn handle_state_variable(node: Node, ctx: &mut Ctx, parent: &Parent) {
    let Some(name) = name_of(node, ctx) else {
        return;
    };
    let modifiers = collect_modifiers(node, ctx);
    let exported = modifiers.iter().any(|m| m == "public");
    let qualified = ctx.qualify(&name);
    ctx.add_symbol(
        &name,
        &qualified,
        SymbolKind::Property,
        range_of(node),
        exported,
        false,
        None,
        preceding_doc(node, ctx.src),
        parent.id.clone(),
        modifiers,
    );
}

fn handle_struct(node: Node, ctx: &mut Ctx, parent: &Parent) {
    let Some(name) = name_of(node, ctx) else {
        return;
    };
    let qualified = ctx.qualify(&name);
    ctx.add_symbol(
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
}

fn handle_enum(node: Node, ctx: &mut Ctx, parent: &Parent) {
    let Some(name) = name_of(node, ctx) else {
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

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "enum_value" {
            let member = ctx.text(child).to_string();
            let member_qualified = format!("{qualified}.{member}");
            ctx.add_symbol(
                &member,
                &member_qualified,
                SymbolKind::EnumMember,
                range_of(child),
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

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

fn call_arg_count(node: Node) -> usize {
    let mut cursor = node.walk();
    let direct = node.children(&mut cursor).filter(|c| c.kind() == "call_argument").count();
    if direct > 0 {
        return direct;
    }
    node.child_by_field_name("arguments")
        .map(|a| a.named_child_count())
        .unwrap_or(0)
}

fn handle_call(node: Node, ctx: &mut Ctx, parent: &Parent) {
    let line = node.start_position().row + 1;
    let column = node.start_position().column;
    let arg_count = call_arg_count(node);

    let callee = node
        .child_by_field_name("function")
        .or_else(|| node.named_child(0));
    if let Some(callee) = callee {
        match callee.kind() {
            "identifier" => {
                ctx.add_call(
                    ctx.text(callee).to_string(),
                    line,
                    column,
                    CallKind::Function,
                    false,
                    None,
                    arg_count,
                );
            }
            "member_expression" => {
                let name = callee
                    .child_by_field_name("property")
                    .map(|p| ctx.text(p).to_string())
                    .unwrap_or_else(|| "(computed)".to_string());
                let receiver = callee
                    .child_by_field_name("object")
                    .map(|o| super::dotted_path(o, ctx.src))
                    .filter(|r| !r.is_empty());
                ctx.add_call(name, line, column, CallKind::Method, true, receiver, arg_count);
            }
            "new_expression" => {
                if let Some(type_name) = name_of(callee, ctx).or_else(|| {
                    callee.named_child(0).map(|c| ctx.text(c).to_string())
                }) {
                    ctx.add_call(
                        type_name,
                        line,
                        column,
                        CallKind::Constructor,
                        false,
                        None,
                        arg_count,
                    );
                }
            }
            _ => {}
        }
    }

    visit_children(node, ctx, parent);
}

fn handle_emit(node: Node, ctx: &mut Ctx, parent: &Parent) {
    // `emit Transfer(a, b)` is a call site of the event.
    let line = node.start_position().row + 1;
    let column = node.start_position().column;
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "call_expression" || child.kind() == "expression" {
            handle_call(child, ctx, parent);
            return;
        }
        if child.kind() == "identifier" {
            ctx.add_call(
                ctx.text(child).to_string(),
                line,
                column,
                CallKind::Function,
                false,
                None,
                0,
            );
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::extract::extract;
    use crate::types::{DependencyKind, SymbolKind};

    fn run(src: &str) -> crate::extract::Extraction {
        extract(src, "/repo/contracts/Token.sol", "contracts/Token.sol", "sol")
    }

    #[test]
    fn test_contract_members() {
        let out = run(r#"
pragma solidity ^0.8.0;

import {SafeMath as SM} from "./SafeMath.sol";

/// A minimal token.
contract Token {
    uint256 public totalSupply;
    mapping(address => uint256) internal balances;

    event Transfer(address from, address to, uint256 value);
    error InsufficientBalance(uint256 requested);

    enum Phase { Setup, Live }

    modifier onlyPositive(uint256 value) {
        require(value > 0);
        _;
    }

    constructor(uint256 supply) {
        totalSupply = supply;
    }

    function transfer(address to, uint256 value) public onlyPositive(value) returns (bool) {
        balances[to] = add(balances[to], value);
        emit Transfer(msg.sender, to, value);
        return true;
    }

    function add(uint256 a, uint256 b) internal pure returns (uint256) {
        return a + b;
    }
}
"#);
        let contract = out.symbols.iter().find(|s| s.name == "Token").unwrap();
        assert_eq!(contract.kind, SymbolKind::Class);
        assert_eq!(contract.documentation.as_deref(), Some("A minimal token."));

        let supply = out.symbols.iter().find(|s| s.name == "totalSupply").unwrap();
        assert_eq!(supply.kind, SymbolKind::Property);
        assert!(supply.is_exported);
        assert_eq!(supply.parent_id.as_deref(), Some(contract.id.as_str()));

        let transfer = out.symbols.iter().find(|s| s.name == "transfer").unwrap();
        assert_eq!(transfer.kind, SymbolKind::Method);
        assert!(transfer.is_exported);
        assert!(transfer.modifiers.contains(&"public".to_string()));

        let event = out.symbols.iter().find(|s| s.name == "Transfer").unwrap();
        assert_eq!(event.kind, SymbolKind::Event);

        let err = out.symbols.iter().find(|s| s.name == "InsufficientBalance").unwrap();
        assert!(err.modifiers.contains(&"error".to_string()));

        assert!(out.symbols.iter().any(|s| s.kind == SymbolKind::EnumMember && s.name == "Live"));
        assert!(out
            .symbols
            .iter()
            .any(|s| s.name == "constructor" && s.modifiers.contains(&"constructor".to_string())));
        assert!(out
            .symbols
            .iter()
            .any(|s| s.name == "onlyPositive" && s.modifiers.contains(&"modifier".to_string())));

        let import = out
            .dependencies
            .iter()
            .find(|d| d.kind == DependencyKind::Import)
            .unwrap();
        assert_eq!(import.target, "./SafeMath.sol");
        assert!(!import.is_external);

        // transfer calls add (same file) and emits Transfer
        let add_call = out.calls.iter().find(|c| c.callee_name == "add").unwrap();
        assert_eq!(add_call.caller_name.as_deref(), Some("Token.transfer"));
        assert!(add_call.callee_id.is_some());
        assert!(out.calls.iter().any(|c| c.callee_name == "Transfer"));
        // the modifier invocation is recorded as a call site too
        assert!(out.calls.iter().any(|c| c.callee_name == "onlyPositive"));
    }

    #[test]
    fn test_library_and_interface_modifiers() {
        let out = run(r#"
library MathLib {
    function min(uint a, uint b) internal pure returns (uint) { return a < b ? a : b; }
}
interface IToken {
    function balanceOf(address who) external view returns (uint256);
}
"#);
        let lib = out.symbols.iter().find(|s| s.name == "MathLib").unwrap();
        assert!(lib.modifiers.contains(&"library".to_string()));

        let iface = out.symbols.iter().find(|s| s.name == "IToken").unwrap();
        assert_eq!(iface.kind, SymbolKind::Interface);
        assert!(iface.modifiers.contains(&"interface".to_string()));

        let balance = out.symbols.iter().find(|s| s.name == "balanceOf").unwrap();
        assert_eq!(balance.parent_id.as_deref(), Some(iface.id.as_str()));
    }
}
