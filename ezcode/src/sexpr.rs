// S-expression formatter for EZCode programs
// Renders parsed lines and declarations as an indented Lisp-like outline

use ezcode_parser::*;

pub fn format_program_as_sexpr(program: &Program) -> String {
    let mut items: Vec<String> = Vec::new();
    for container in program.containers.values() {
        items.push(format_container(container));
    }
    for line in &program.lines {
        items.push(format_line_with_indent(line, 2));
    }

    if items.is_empty() {
        "(program)".to_string()
    } else {
        format!("(program\n  {})", items.join("\n  "))
    }
}

fn format_line_with_indent(line: &TokenLine, indent: usize) -> String {
    let Some(first) = line.tokens.first() else {
        return format!("(line {})", line.line.number);
    };

    match &first.value {
        TokenValue::Statement(statement) => format_statement_with_indent(statement, indent),
        TokenValue::Class(class) => format_class_with_indent(class, indent),
        TokenValue::Method(method) => format_method_with_indent(method, indent),
        TokenValue::Container(container) => format!("(container-ref {})", container.name),
        _ => format!(
            "(line {} {})",
            line.line.number,
            line.tokens
                .iter()
                .map(format_token)
                .collect::<Vec<_>>()
                .join(" ")
        ),
    }
}

fn format_token(token: &Token) -> String {
    match &token.value {
        TokenValue::Bound(call) => format!(
            "(match {}.{} {})",
            call.class_name,
            call.method,
            call.args
                .iter()
                .map(|arg| format!("{}={:?}", arg.name, arg.text))
                .collect::<Vec<_>>()
                .join(" ")
        ),
        TokenValue::HostCall(call) => {
            let kind = if call.is_dynamic { "host-dynamic" } else { "host" };
            if call.args.is_empty() {
                format!("({kind} {})", call.path)
            } else {
                format!("({kind} {} {:?})", call.path, call.args)
            }
        }
        _ => match token.kind {
            TokenKind::Identifier => format!("{:?}", token.to_string()),
            kind => format!("{kind:?}"),
        },
    }
}

fn format_body(body: &[TokenLine], indent: usize) -> String {
    let pad = " ".repeat(indent);
    body.iter()
        .map(|line| format!("\n{pad}{}", format_line_with_indent(line, indent)))
        .collect()
}

fn format_statement_with_indent(statement: &Statement, indent: usize) -> String {
    let condition = statement
        .condition
        .as_ref()
        .map(|condition| format!(" {:?}", condition.text))
        .unwrap_or_default();
    format!(
        "({}{}{})",
        statement.kind,
        condition,
        format_body(&statement.body, indent + 2)
    )
}

fn format_method_with_indent(method: &Method, indent: usize) -> String {
    let mut header = format!("(method {}", method.name);
    if method.settings.is_static {
        header.push_str(" :static");
    }
    if method.settings.nocol {
        header.push_str(" :nocol");
    }
    for param in &method.params {
        header.push_str(&format!(" {}", format_variable(param)));
    }
    if let Some(returns) = &method.returns {
        header.push_str(&format!(" (returns {returns})"));
    }
    format!("{header}{})", format_body(&method.body, indent + 2))
}

fn format_variable(variable: &Variable) -> String {
    let optional = if variable.required { "" } else { "?" };
    match &variable.default {
        Some(default) => format!("({}{optional} {} {:?})", variable.name, variable.data_type, default),
        None => format!("({}{optional} {})", variable.name, variable.data_type),
    }
}

fn format_class_with_indent(class: &Class, indent: usize) -> String {
    let pad = " ".repeat(indent + 2);
    let mut parts = Vec::new();

    if class.settings.is_static {
        parts.push(":static".to_string());
    }
    if let Some(type_of) = &class.type_of {
        parts.push(format!("(typeof {type_of})"));
    }
    if !class.inside_of.is_empty() {
        let owners = class
            .inside_of
            .iter()
            .map(|data_type| data_type.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        parts.push(format!("(insideof {owners})"));
    }
    for property in &class.properties {
        parts.push(format!("(property {})", format_variable(property)));
    }
    if let Some(rule) = &class.params {
        let kind = if rule.is_override { "params-override" } else { "params" };
        parts.push(format!("({kind} {:?} => {})", rule.pattern.source, rule.method));
    }
    for rule in &class.watch {
        parts.push(format!("(watch {:?} => {})", rule.pattern.source, rule.method));
    }
    for converter in &class.converters {
        parts.push(format!(
            "(get {}{})",
            converter.data_type,
            format_body(&converter.method.body, indent + 4)
        ));
    }
    for method in class.methods.values() {
        parts.push(format_method_with_indent(method, indent + 2));
    }
    for nested in &class.classes {
        parts.push(format_class_with_indent(nested, indent + 2));
    }

    let members: String = parts.iter().map(|part| format!("\n{pad}{part}")).collect();
    format!("(class {}{members})", class.name)
}

fn format_container(container: &Container) -> String {
    format!("(container {} {})", container.name, container.classes.join(" "))
}
