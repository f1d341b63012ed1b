// EZCode AST Definitions
// Tokens, lines and the structural objects the parser builds out of them

use crate::pattern::Pattern;
use indexmap::IndexMap;
use std::rc::Rc;

/// A single source line with its 1-based line number in the source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub text: String,
    pub number: usize,
}

impl Line {
    pub fn new(text: impl Into<String>, number: usize) -> Self {
        Self {
            text: text.into(),
            number,
        }
    }
}

/// A line together with the tokens it lexed into
#[derive(Debug, Clone, PartialEq)]
pub struct TokenLine {
    pub line: Line,
    pub tokens: Vec<Token>,
}

impl TokenLine {
    pub fn new(line: Line, tokens: Vec<Token>) -> Self {
        Self { line, tokens }
    }

    pub fn first_kind(&self) -> Option<TokenKind> {
        self.tokens.first().map(|token| token.kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Null,
    Comment,
    Comma,
    QuestionMark,
    Colon,
    Arrow,
    DataType,
    OpenBrace,
    CloseBrace,
    New,
    If,
    Else,
    Elif,
    Loop,
    Try,
    Fail,
    Identifier,
    Undefined,
    Class,
    Static,
    Explicit,
    Watch,
    Params,
    TypeOf,
    InsideOf,
    Semi,
    Ontop,
    NoCol,
    Method,
    Match,
    Container,
    Return,
    Get,
    And,
    Not,
    Or,
    Make,
    Is,
    RunExec,
    Override,
    Break,
    Yield,
}

impl TokenKind {
    /// Keyword table lookup. Anything not listed here lexes as an identifier.
    pub fn from_keyword(text: &str) -> Option<Self> {
        let kind = match text {
            "null" => TokenKind::Null,
            "," => TokenKind::Comma,
            "?" => TokenKind::QuestionMark,
            ":" => TokenKind::Colon,
            "=>" => TokenKind::Arrow,
            "{" => TokenKind::OpenBrace,
            "}" => TokenKind::CloseBrace,
            "new" => TokenKind::New,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "elif" => TokenKind::Elif,
            "loop" => TokenKind::Loop,
            "try" => TokenKind::Try,
            "fail" => TokenKind::Fail,
            "undefined" => TokenKind::Undefined,
            "class" => TokenKind::Class,
            "static" => TokenKind::Static,
            "explicit" => TokenKind::Explicit,
            "watch" => TokenKind::Watch,
            "params" => TokenKind::Params,
            "typeof" => TokenKind::TypeOf,
            "insideof" => TokenKind::InsideOf,
            "semi" => TokenKind::Semi,
            "ontop" => TokenKind::Ontop,
            "nocol" => TokenKind::NoCol,
            "method" => TokenKind::Method,
            "container" => TokenKind::Container,
            "return" => TokenKind::Return,
            "get" => TokenKind::Get,
            "and" | "&" | "&&" => TokenKind::And,
            "not" | "!" => TokenKind::Not,
            "or" | "|" | "||" => TokenKind::Or,
            "make" => TokenKind::Make,
            "is" => TokenKind::Is,
            "runexec" => TokenKind::RunExec,
            "override" => TokenKind::Override,
            "break" => TokenKind::Break,
            "yield" => TokenKind::Yield,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_statement(self) -> bool {
        matches!(
            self,
            TokenKind::If
                | TokenKind::Elif
                | TokenKind::Else
                | TokenKind::Loop
                | TokenKind::Try
                | TokenKind::Fail
        )
    }
}

/// The payload of a token: raw text, or a structural object the parser put in its slot
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    Text(String),
    Statement(Box<Statement>),
    Class(Rc<Class>),
    Method(Rc<Method>),
    Container(Rc<Container>),
    Bound(BoundCall),
    HostCall(HostCall),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: TokenValue,
}

impl Token {
    pub fn new(kind: TokenKind, value: TokenValue) -> Self {
        Self { kind, value }
    }

    pub fn text(kind: TokenKind, text: impl Into<String>) -> Self {
        Self::new(kind, TokenValue::Text(text.into()))
    }

    pub fn identifier(text: impl Into<String>) -> Self {
        Self::text(TokenKind::Identifier, text)
    }

    pub fn statement(statement: Statement) -> Self {
        let kind = statement.kind.token_kind();
        Self::new(kind, TokenValue::Statement(Box::new(statement)))
    }

    /// The raw text of a text token, `None` for structural tokens
    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            TokenValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.value {
            TokenValue::Text(text) => write!(f, "{text}"),
            TokenValue::Statement(statement) => write!(f, "{}", statement.kind),
            TokenValue::Class(class) => write!(f, "class {}", class.name),
            TokenValue::Method(method) => write!(f, "method {}", method.name),
            TokenValue::Container(container) => write!(f, "container {}", container.name),
            TokenValue::Bound(call) => write!(f, "{}", call.source),
            TokenValue::HostCall(call) => write!(f, "{call}"),
        }
    }
}

/// Join the display text of a token run with single spaces
pub fn join_tokens(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|token| token.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Primitive tag of a data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Untyped,
    Object,
    String,
    Int,
    Float,
    Bool,
    Char,
    Double,
    Decimal,
    Long,
    UInt,
    ULong,
}

impl TypeTag {
    pub fn from_name(name: &str) -> Option<Self> {
        let tag = match name {
            "string" | "str" => TypeTag::String,
            "int" => TypeTag::Int,
            "float" => TypeTag::Float,
            "bool" => TypeTag::Bool,
            "char" => TypeTag::Char,
            "double" => TypeTag::Double,
            "decimal" => TypeTag::Decimal,
            "long" => TypeTag::Long,
            "uint" => TypeTag::UInt,
            "ulong" => TypeTag::ULong,
            "object" => TypeTag::Object,
            _ => return None,
        };
        Some(tag)
    }

    pub fn is_primitive(self) -> bool {
        !matches!(self, TypeTag::Untyped | TypeTag::Object)
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            TypeTag::Int
                | TypeTag::Float
                | TypeTag::Double
                | TypeTag::Decimal
                | TypeTag::Long
                | TypeTag::UInt
                | TypeTag::ULong
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            TypeTag::Untyped => "untyped",
            TypeTag::Object => "object",
            TypeTag::String => "string",
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::Bool => "bool",
            TypeTag::Char => "char",
            TypeTag::Double => "double",
            TypeTag::Decimal => "decimal",
            TypeTag::Long => "long",
            TypeTag::UInt => "uint",
            TypeTag::ULong => "ulong",
        }
    }
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A declared type: primitive tag plus an optional nominal class or container reference.
///
/// Classes and containers are referenced by name and resolved against the
/// program tables when the type is used.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataType {
    pub tag: TypeTag,
    pub class: Option<String>,
    pub container: Option<String>,
}

impl DataType {
    pub const UNTYPED: DataType = DataType {
        tag: TypeTag::Untyped,
        class: None,
        container: None,
    };

    pub fn primitive(tag: TypeTag) -> Self {
        Self {
            tag,
            class: None,
            container: None,
        }
    }

    pub fn class(tag: TypeTag, name: impl Into<String>) -> Self {
        Self {
            tag,
            class: Some(name.into()),
            container: None,
        }
    }

    pub fn container(name: impl Into<String>) -> Self {
        Self {
            tag: TypeTag::Object,
            class: None,
            container: Some(name.into()),
        }
    }

    pub fn is_untyped(&self) -> bool {
        self.tag == TypeTag::Untyped && self.class.is_none() && self.container.is_none()
    }
}

impl Default for DataType {
    fn default() -> Self {
        Self::UNTYPED
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.class, &self.container) {
            (Some(class), _) => write!(f, "@{class}"),
            (None, Some(container)) => write!(f, "@{container}"),
            (None, None) if self.tag == TypeTag::Untyped => write!(f, "untyped"),
            (None, None) => write!(f, "@{}", self.tag),
        }
    }
}

/// A declared variable: method parameter, class property or pattern capture variable
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub data_type: DataType,
    pub required: bool,
    /// Initial value text for properties declared `Type name new : value`
    pub default: Option<String>,
    pub line: usize,
}

impl Variable {
    pub fn new(name: impl Into<String>, data_type: DataType, line: usize) -> Self {
        Self {
            name: name.into(),
            data_type,
            required: true,
            default: None,
            line,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MethodSettings {
    pub is_static: bool,
    /// Called without the `:` separator before its arguments
    pub nocol: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub name: String,
    pub line: usize,
    pub settings: MethodSettings,
    pub params: Vec<Variable>,
    pub returns: Option<DataType>,
    pub body: Vec<TokenLine>,
}

impl Method {
    pub fn required_count(&self) -> usize {
        self.params.iter().filter(|param| param.required).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClassSettings {
    pub is_static: bool,
    pub semi: bool,
    pub ontop: bool,
}

/// A `get => @type` converter declared inside a class
#[derive(Debug, Clone, PartialEq)]
pub struct TypeConverter {
    pub data_type: DataType,
    pub method: Rc<Method>,
}

/// A compiled `explicit watch` or `explicit params` rule
#[derive(Debug, Clone, PartialEq)]
pub struct PatternRule {
    pub pattern: Pattern,
    pub class_name: String,
    pub method: String,
    pub vars: Vec<Variable>,
    pub is_override: bool,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Class {
    pub name: String,
    pub line: usize,
    pub settings: ClassSettings,
    pub properties: Vec<Variable>,
    pub methods: IndexMap<String, Rc<Method>>,
    pub classes: Vec<Rc<Class>>,
    pub watch: Vec<PatternRule>,
    pub params: Option<PatternRule>,
    pub type_of: Option<DataType>,
    pub converters: Vec<TypeConverter>,
    pub inside_of: Vec<DataType>,
    /// Number of source lines the declaration consumed, header included
    pub length: usize,
}

impl Class {
    pub fn property(&self, name: &str) -> Option<&Variable> {
        self.properties.iter().find(|property| property.name == name)
    }

    pub fn converter(&self, data_type: &DataType) -> Option<&TypeConverter> {
        self.converters
            .iter()
            .find(|converter| &converter.data_type == data_type)
    }

    /// The type an instance of this class carries
    pub fn instance_type(&self) -> DataType {
        let tag = self
            .type_of
            .as_ref()
            .map(|data_type| data_type.tag)
            .unwrap_or(TypeTag::Object);
        DataType::class(tag, self.name.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub name: String,
    pub line: usize,
    pub classes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    If,
    Elif,
    Else,
    Loop,
    Try,
    Fail,
}

impl StatementKind {
    pub fn from_keyword(text: &str) -> Option<Self> {
        let kind = match text {
            "if" => StatementKind::If,
            "elif" => StatementKind::Elif,
            "else" => StatementKind::Else,
            "loop" => StatementKind::Loop,
            "try" => StatementKind::Try,
            "fail" => StatementKind::Fail,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_conditional(self) -> bool {
        matches!(
            self,
            StatementKind::If | StatementKind::Elif | StatementKind::Loop
        )
    }

    pub fn token_kind(self) -> TokenKind {
        match self {
            StatementKind::If => TokenKind::If,
            StatementKind::Elif => TokenKind::Elif,
            StatementKind::Else => TokenKind::Else,
            StatementKind::Loop => TokenKind::Loop,
            StatementKind::Try => TokenKind::Try,
            StatementKind::Fail => TokenKind::Fail,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            StatementKind::If => "if",
            StatementKind::Elif => "elif",
            StatementKind::Else => "else",
            StatementKind::Loop => "loop",
            StatementKind::Try => "try",
            StatementKind::Fail => "fail",
        }
    }
}

impl std::fmt::Display for StatementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Join {
    And,
    Or,
}

/// One sub-condition of a statement argument
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionTerm {
    pub tokens: Vec<Token>,
    pub text: String,
    pub negated: bool,
    /// How this term combines with the next one
    pub join: Option<Join>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub text: String,
    pub tokens: Vec<Token>,
    pub terms: Vec<ConditionTerm>,
}

impl Condition {
    /// Split a token run into terms at `and`/`or` markers, reading a leading `not` as negation
    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        let mut terms = Vec::new();
        let mut current = Vec::new();
        for token in &tokens {
            let join = match token.kind {
                TokenKind::And => Some(Join::And),
                TokenKind::Or => Some(Join::Or),
                _ => None,
            };
            match join {
                Some(join) => terms.push(Self::term(std::mem::take(&mut current), Some(join))),
                None => current.push(token.clone()),
            }
        }
        terms.push(Self::term(current, None));

        Self {
            text: join_tokens(&tokens),
            tokens,
            terms,
        }
    }

    fn term(mut tokens: Vec<Token>, join: Option<Join>) -> ConditionTerm {
        let negated = tokens.first().is_some_and(|token| token.is(TokenKind::Not));
        if negated {
            tokens.remove(0);
        }
        ConditionTerm {
            text: join_tokens(&tokens),
            tokens,
            negated,
            join,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub line: usize,
    pub text: String,
    pub condition: Option<Condition>,
    pub body: Vec<TokenLine>,
}

/// A value bound into a pattern-dispatched call
#[derive(Debug, Clone, PartialEq)]
pub struct BoundArg {
    pub name: String,
    pub text: String,
    pub data_type: DataType,
}

/// A call produced by a watch pattern match
#[derive(Debug, Clone, PartialEq)]
pub struct BoundCall {
    pub class_name: String,
    pub method: String,
    pub args: Vec<BoundArg>,
    /// The text the pattern matched
    pub source: String,
}

/// A `runexec => path ~> args` call handed to the host runtime
#[derive(Debug, Clone, PartialEq)]
pub struct HostCall {
    pub path: String,
    pub args: Vec<String>,
    /// The path is a quoted variable name whose text holds the real call
    pub is_dynamic: bool,
}

impl HostCall {
    pub fn variable_name(&self) -> &str {
        self.path.trim_matches('\'')
    }
}

impl std::fmt::Display for HostCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "runexec => {}", self.path)?;
        if !self.args.is_empty() {
            write!(f, " ~> {}", self.args.join(", "))?;
        }
        Ok(())
    }
}

/// A parsed program: executable lines plus the declaration tables
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub lines: Vec<TokenLine>,
    pub classes: IndexMap<String, Rc<Class>>,
    pub methods: IndexMap<String, Rc<Method>>,
    pub containers: IndexMap<String, Rc<Container>>,
}
