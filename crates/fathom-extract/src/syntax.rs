//! Tree-sitter walk over JavaScript / TypeScript syntax trees.

use fathom_core::FathomError;
use tree_sitter::{Node, Parser, Tree};

use crate::{
    scan, ConstructCandidate, ConstructKind, ExtractedItem, Flags, Language, MethodSignature, Span,
};

/// Parse `text` with the grammar for `language`.
///
/// Returns `Ok(None)` when tree-sitter gives up without producing a tree.
///
/// # Errors
///
/// Returns [`FathomError::Extraction`] if the grammar cannot be loaded.
pub fn parse(text: &str, language: Language) -> Result<Option<Tree>, FathomError> {
    let mut parser = Parser::new();
    parser
        .set_language(&language.tree_sitter_language())
        .map_err(|e| FathomError::Extraction(format!("failed to set language: {e}")))?;
    Ok(parser.parse(text, None))
}

/// Collect constructs from a parsed tree, ordered by span start.
///
/// # Examples
///
/// ```
/// use fathom_extract::{syntax, ExtractedItem, Language};
///
/// let text = "class A extends B { constructor() { super(); } }";
/// let tree = syntax::parse(text, Language::JavaScript).unwrap().unwrap();
/// let items = syntax::collect(&tree, text);
/// let ExtractedItem::Construct(a) = &items[0] else { panic!() };
/// assert_eq!(a.superclass.as_deref(), Some("B"));
/// assert_eq!(items.len(), 2);
/// ```
pub fn collect(tree: &Tree, text: &str) -> Vec<ExtractedItem> {
    let mut items = Vec::new();
    walk(tree.root_node(), text.as_bytes(), &mut items);
    items.sort_by_key(|item| item.span().start);
    items
}

/// Pre-order traversal with a cursor, so nesting depth costs no stack.
fn walk(root: Node, source: &[u8], items: &mut Vec<ExtractedItem>) {
    let mut cursor = root.walk();
    loop {
        visit(cursor.node(), source, items);
        if cursor.goto_first_child() {
            continue;
        }
        while !cursor.goto_next_sibling() {
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

fn visit(node: Node, source: &[u8], items: &mut Vec<ExtractedItem>) {
    match node.kind() {
        "function_declaration" | "generator_function_declaration" => {
            items.push(function_declaration(&node, source));
        }
        // `export default function name() {}` may parse as an expression
        "function_expression" | "function"
            if export_parent(&node).is_some() && node.child_by_field_name("name").is_some() =>
        {
            items.push(function_declaration(&node, source));
        }
        "variable_declarator" => {
            if let Some(item) = bound_function(&node, source) {
                items.push(item);
            }
        }
        "class_declaration" | "abstract_class_declaration" => {
            items.push(class_declaration(&node, source));
        }
        "method_definition" => {
            if let Some(item) = class_method(&node, source) {
                items.push(item);
            }
        }
        _ => {}
    }
}

fn function_declaration(node: &Node, source: &[u8]) -> ExtractedItem {
    let outer = export_parent(node).unwrap_or(*node);
    let Some(name) = node.child_by_field_name("name").map(|n| node_text(&n, source)) else {
        return failed(&outer, "function declaration without a name");
    };
    ExtractedItem::Construct(ConstructCandidate {
        span: span_of(&outer),
        kind: ConstructKind::Function,
        name,
        parameters: parameters(node, source),
        flags: Flags {
            is_async: has_token(node, "async"),
            is_exported: outer.id() != node.id(),
            ..Flags::default()
        },
        superclass: None,
        interfaces: Vec::new(),
        members: Vec::new(),
    })
}

/// `const f = () => {}`, `const f = function () {}`, `const x = useThing()`.
fn bound_function(node: &Node, source: &[u8]) -> Option<ExtractedItem> {
    let value = node.child_by_field_name("value")?;
    let kind = match value.kind() {
        "arrow_function" | "function_expression" | "function" | "generator_function" => {
            ConstructKind::Function
        }
        "call_expression" if is_hook_call(&value, source) => ConstructKind::HookBinding,
        _ => return None,
    };

    let declaration = node.parent().filter(|p| {
        matches!(p.kind(), "lexical_declaration" | "variable_declaration") && p.named_child_count() == 1
    });
    let statement = declaration.unwrap_or(*node);
    let outer = export_parent(&statement).unwrap_or(statement);
    let is_exported = node
        .parent()
        .and_then(|p| export_parent(&p))
        .is_some();

    let name_node = node.child_by_field_name("name")?;
    if name_node.kind() != "identifier" {
        // destructuring patterns bind several names
        return None;
    }

    let (parameters, flags) = match kind {
        ConstructKind::HookBinding => (Vec::new(), Flags { is_exported, ..Flags::default() }),
        _ => (
            parameters(&value, source),
            Flags {
                is_async: has_token(&value, "async"),
                is_exported,
                is_arrow: value.kind() == "arrow_function",
                ..Flags::default()
            },
        ),
    };

    Some(ExtractedItem::Construct(ConstructCandidate {
        span: span_of(&outer),
        kind,
        name: node_text(&name_node, source),
        parameters,
        flags,
        superclass: None,
        interfaces: Vec::new(),
        members: Vec::new(),
    }))
}

fn is_hook_call(call: &Node, source: &[u8]) -> bool {
    let Some(callee) = call.child_by_field_name("function") else {
        return false;
    };
    if callee.kind() != "identifier" {
        return false;
    }
    let name = node_text(&callee, source);
    name.strip_prefix("use")
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_uppercase())
}

fn class_declaration(node: &Node, source: &[u8]) -> ExtractedItem {
    let outer = export_parent(node).unwrap_or(*node);
    let Some(name) = node.child_by_field_name("name").map(|n| node_text(&n, source)) else {
        return failed(&outer, "class declaration without a name");
    };

    let mut superclass = None;
    let mut interfaces = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "class_heritage" {
            continue;
        }
        let mut heritage = child.walk();
        for clause in child.named_children(&mut heritage) {
            match clause.kind() {
                "extends_clause" => {
                    superclass = clause
                        .child_by_field_name("value")
                        .or_else(|| clause.named_child(0))
                        .map(|v| node_text(&v, source));
                }
                "implements_clause" => {
                    let mut types = clause.walk();
                    interfaces.extend(clause.named_children(&mut types).map(|t| node_text(&t, source)));
                }
                // plain JavaScript: the heritage holds the expression itself
                _ => superclass = Some(node_text(&clause, source)),
            }
        }
    }

    let members = node
        .child_by_field_name("body")
        .map(|body| {
            let mut cursor = body.walk();
            let members: Vec<MethodSignature> = body
                .named_children(&mut cursor)
                .filter(|m| m.kind() == "method_definition" || m.kind() == "abstract_method_signature")
                .filter_map(|m| {
                    let name = m.child_by_field_name("name")?;
                    let visibility = find_child(&m, "accessibility_modifier")
                        .map_or_else(|| "public".to_string(), |v| node_text(&v, source));
                    Some(MethodSignature {
                        visibility,
                        is_static: has_token(&m, "static"),
                        name: node_text(&name, source),
                    })
                })
                .collect();
            members
        })
        .unwrap_or_default();

    ExtractedItem::Construct(ConstructCandidate {
        span: span_of(&outer),
        kind: ConstructKind::Class,
        name,
        parameters: Vec::new(),
        flags: Flags {
            is_exported: outer.id() != node.id(),
            ..Flags::default()
        },
        superclass,
        interfaces,
        members,
    })
}

/// Non-static, non-computed methods of a class body.
fn class_method(node: &Node, source: &[u8]) -> Option<ExtractedItem> {
    if node.parent()?.kind() != "class_body" || has_token(node, "static") {
        return None;
    }
    let name = node.child_by_field_name("name")?;
    if name.kind() == "computed_property_name" {
        return None;
    }

    let is_getter = has_token(node, "get");
    let is_setter = has_token(node, "set");
    Some(ExtractedItem::Construct(ConstructCandidate {
        span: span_of(node),
        kind: if is_getter || is_setter {
            ConstructKind::Accessor
        } else {
            ConstructKind::Method
        },
        name: node_text(&name, source),
        parameters: parameters(node, source),
        flags: Flags {
            is_async: has_token(node, "async"),
            is_getter,
            is_setter,
            ..Flags::default()
        },
        superclass: None,
        interfaces: Vec::new(),
        members: Vec::new(),
    }))
}

fn parameters(node: &Node, source: &[u8]) -> Vec<String> {
    if let Some(list) = node.child_by_field_name("parameters") {
        let text = node_text(&list, source);
        let inner = text
            .strip_prefix('(')
            .and_then(|t| t.strip_suffix(')'))
            .unwrap_or(&text);
        return scan::split_params(inner);
    }
    // single unparenthesized arrow parameter
    node.child_by_field_name("parameter")
        .map(|p| vec![node_text(&p, source)])
        .unwrap_or_default()
}

fn export_parent<'t>(node: &Node<'t>) -> Option<Node<'t>> {
    node.parent().filter(|p| p.kind() == "export_statement")
}

fn has_token(node: &Node, kind: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| c.kind() == kind);
    found
}

fn find_child<'t>(node: &Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|c| c.kind() == kind);
    found
}

fn span_of(node: &Node) -> Span {
    Span::new(node.start_byte(), node.end_byte())
}

fn failed(node: &Node, message: &str) -> ExtractedItem {
    ExtractedItem::Failed {
        span: span_of(node),
        message: message.to_string(),
    }
}

fn node_text(node: &Node, source: &[u8]) -> String {
    let start = node.start_byte();
    let end = node.end_byte();
    if start >= source.len() || end > source.len() {
        return String::new();
    }
    String::from_utf8_lossy(&source[start..end]).to_string()
}
