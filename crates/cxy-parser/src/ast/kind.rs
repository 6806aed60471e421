//! AST node kinds.
//!
//! One enum variant per node tag; children are `NodeIndex` references into
//! the owning `NodeArena`. Sibling lists are ordered `Vec<NodeIndex>`.

use super::arena::{NodeIndex, NodeList};
use super::operator::Operator;
use cxy_common::Atom;
use cxy_lexer::{FloatSuffix, IntSuffix};

/// Built-in primitive types. `wchar` is a 32-bit character, `char` an 8-bit
/// one. The 128-bit integers back `sizeof`-style comptime queries and
/// literal suffixes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveKind {
    Bool,
    WChar,
    Char,
    I8,
    I16,
    I32,
    I64,
    I128,
    U8,
    U16,
    U32,
    U64,
    U128,
    F32,
    F64,
}

impl PrimitiveKind {
    pub fn from_name(name: &str) -> Option<PrimitiveKind> {
        Some(match name {
            "bool" => PrimitiveKind::Bool,
            "wchar" => PrimitiveKind::WChar,
            "char" => PrimitiveKind::Char,
            "i8" => PrimitiveKind::I8,
            "i16" => PrimitiveKind::I16,
            "i32" => PrimitiveKind::I32,
            "i64" => PrimitiveKind::I64,
            "i128" => PrimitiveKind::I128,
            "u8" => PrimitiveKind::U8,
            "u16" => PrimitiveKind::U16,
            "u32" => PrimitiveKind::U32,
            "u64" => PrimitiveKind::U64,
            "u128" => PrimitiveKind::U128,
            "f32" => PrimitiveKind::F32,
            "f64" => PrimitiveKind::F64,
            _ => return None,
        })
    }

    pub const fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::WChar => "wchar",
            PrimitiveKind::Char => "char",
            PrimitiveKind::I8 => "i8",
            PrimitiveKind::I16 => "i16",
            PrimitiveKind::I32 => "i32",
            PrimitiveKind::I64 => "i64",
            PrimitiveKind::I128 => "i128",
            PrimitiveKind::U8 => "u8",
            PrimitiveKind::U16 => "u16",
            PrimitiveKind::U32 => "u32",
            PrimitiveKind::U64 => "u64",
            PrimitiveKind::U128 => "u128",
            PrimitiveKind::F32 => "f32",
            PrimitiveKind::F64 => "f64",
        }
    }

    pub const fn size(self) -> u64 {
        match self {
            PrimitiveKind::Bool | PrimitiveKind::Char | PrimitiveKind::I8 | PrimitiveKind::U8 => 1,
            PrimitiveKind::I16 | PrimitiveKind::U16 => 2,
            PrimitiveKind::WChar
            | PrimitiveKind::I32
            | PrimitiveKind::U32
            | PrimitiveKind::F32 => 4,
            PrimitiveKind::I64 | PrimitiveKind::U64 | PrimitiveKind::F64 => 8,
            PrimitiveKind::I128 | PrimitiveKind::U128 => 16,
        }
    }

    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            PrimitiveKind::I8
                | PrimitiveKind::I16
                | PrimitiveKind::I32
                | PrimitiveKind::I64
                | PrimitiveKind::I128
                | PrimitiveKind::U8
                | PrimitiveKind::U16
                | PrimitiveKind::U32
                | PrimitiveKind::U64
                | PrimitiveKind::U128
        )
    }

    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            PrimitiveKind::I8
                | PrimitiveKind::I16
                | PrimitiveKind::I32
                | PrimitiveKind::I64
                | PrimitiveKind::I128
        )
    }

    pub const fn is_float(self) -> bool {
        matches!(self, PrimitiveKind::F32 | PrimitiveKind::F64)
    }

    pub const fn bits(self) -> u32 {
        (self.size() * 8) as u32
    }
}

/// The node tag plus its payload.
#[derive(Clone, Debug, PartialEq)]
pub enum AstKind {
    // =====================================================================
    // Program structure
    // =====================================================================
    Program {
        module: Option<NodeIndex>,
        imports: NodeList,
        decls: NodeList,
    },
    ModuleDecl {
        name: Atom,
    },
    ImportDecl {
        /// String-literal path node
        path: NodeIndex,
        entities: NodeList,
        alias: Option<Atom>,
        is_plugin: bool,
    },
    ImportEntity {
        name: Atom,
        alias: Option<Atom>,
    },

    // =====================================================================
    // Declarations
    // =====================================================================
    FuncDecl {
        name: Atom,
        generic_params: NodeList,
        params: NodeList,
        ret: Option<NodeIndex>,
        body: Option<NodeIndex>,
        /// Set when this declares an operator overload
        operator: Option<Operator>,
    },
    FuncParam {
        name: Atom,
        ty: Option<NodeIndex>,
        default: Option<NodeIndex>,
    },
    GenericParam {
        name: Atom,
        constraints: NodeList,
        default: Option<NodeIndex>,
        /// Position of the value parameter this type parameter can be
        /// inferred from, when the shaker computed one
        infer_index: Option<u32>,
    },
    VarDecl {
        /// One `Identifier` node per declared name; more than one only
        /// before shaking
        names: NodeList,
        ty: Option<NodeIndex>,
        init: Option<NodeIndex>,
    },
    TypeDecl {
        name: Atom,
        generic_params: NodeList,
        /// `None` declares an opaque type
        aliased: Option<NodeIndex>,
    },
    StructDecl {
        name: Atom,
        generic_params: NodeList,
        members: NodeList,
    },
    ClassDecl {
        name: Atom,
        generic_params: NodeList,
        base: Option<NodeIndex>,
        interfaces: NodeList,
        members: NodeList,
    },
    InterfaceDecl {
        name: Atom,
        generic_params: NodeList,
        members: NodeList,
    },
    EnumDecl {
        name: Atom,
        base: Option<NodeIndex>,
        options: NodeList,
    },
    EnumOption {
        name: Atom,
        value: Option<NodeIndex>,
    },
    FieldDecl {
        name: Atom,
        ty: NodeIndex,
        default: Option<NodeIndex>,
    },
    ExceptionDecl {
        name: Atom,
        params: NodeList,
        /// Body of the generated `what()` method
        body: NodeIndex,
    },
    MacroDecl {
        name: Atom,
        params: NodeList,
        body: NodeIndex,
    },
    TestDecl {
        /// Interned test name string
        name: Atom,
        body: NodeIndex,
    },

    // =====================================================================
    // Type syntax
    // =====================================================================
    PrimitiveType {
        kind: PrimitiveKind,
    },
    VoidType,
    StringType,
    AutoType,
    PointerType {
        pointee: NodeIndex,
    },
    ReferenceType {
        referred: NodeIndex,
    },
    ArrayType {
        element: NodeIndex,
        /// `None` for a slice `[T]`
        size: Option<NodeIndex>,
    },
    TupleType {
        elements: NodeList,
    },
    UnionType {
        members: NodeList,
    },
    OptionalType {
        target: NodeIndex,
    },
    FuncType {
        params: NodeList,
        ret: NodeIndex,
    },
    ResultType {
        target: NodeIndex,
    },

    // =====================================================================
    // Expressions
    // =====================================================================
    NullLit,
    BoolLit {
        value: bool,
    },
    IntLit {
        value: u128,
        suffix: Option<IntSuffix>,
        negative: bool,
    },
    FloatLit {
        value: f64,
        suffix: Option<FloatSuffix>,
    },
    CharLit {
        raw: Atom,
    },
    StringLit {
        raw: Atom,
    },
    Identifier {
        name: Atom,
    },
    Path {
        elements: NodeList,
    },
    PathElement {
        name: Atom,
        args: NodeList,
        /// Depth up the inheritance chain for `super` elements
        super_depth: u32,
    },
    MemberExpr {
        target: NodeIndex,
        member: NodeIndex,
        /// `?.` access
        optional: bool,
    },
    CallExpr {
        callee: NodeIndex,
        args: NodeList,
    },
    MacroCallExpr {
        callee: NodeIndex,
        args: NodeList,
    },
    IndexExpr {
        target: NodeIndex,
        indices: NodeList,
    },
    UnaryExpr {
        op: Operator,
        operand: NodeIndex,
        prefix: bool,
    },
    BinaryExpr {
        op: Operator,
        lhs: NodeIndex,
        rhs: NodeIndex,
    },
    AssignExpr {
        op: Operator,
        lhs: NodeIndex,
        rhs: NodeIndex,
    },
    TernaryExpr {
        cond: NodeIndex,
        then: NodeIndex,
        otherwise: NodeIndex,
    },
    CastExpr {
        expr: NodeIndex,
        target: NodeIndex,
        /// `!:` forced cast skips the assignability check
        unchecked: bool,
    },
    TupleExpr {
        elements: NodeList,
    },
    ArrayExpr {
        elements: NodeList,
    },
    StructExpr {
        /// Path naming the struct
        left: NodeIndex,
        fields: NodeList,
    },
    FieldInit {
        name: Atom,
        value: NodeIndex,
    },
    ClosureExpr {
        is_async: bool,
        params: NodeList,
        ret: Option<NodeIndex>,
        body: NodeIndex,
    },
    /// Interpolated string prior to shaking; parts alternate literal text
    /// and expressions
    StringExpr {
        parts: NodeList,
    },
    GroupExpr {
        inner: NodeIndex,
    },
    NewExpr {
        target: NodeIndex,
        args: NodeList,
    },
    /// `#{expr}` comptime substitution
    Substitute {
        expr: NodeIndex,
    },
    AsmExpr {
        template: Atom,
        outputs: NodeList,
        inputs: NodeList,
        clobbers: NodeList,
        flags: NodeList,
    },

    // =====================================================================
    // Statements
    // =====================================================================
    Block {
        stmts: NodeList,
    },
    ExprStmt {
        expr: NodeIndex,
    },
    ReturnStmt {
        value: Option<NodeIndex>,
    },
    BreakStmt,
    ContinueStmt,
    DeferStmt {
        expr: NodeIndex,
    },
    YieldStmt {
        value: NodeIndex,
    },
    RaiseStmt {
        value: NodeIndex,
    },
    IfStmt {
        cond: NodeIndex,
        then: NodeIndex,
        otherwise: Option<NodeIndex>,
    },
    WhileStmt {
        cond: NodeIndex,
        body: NodeIndex,
    },
    ForStmt {
        var: NodeIndex,
        range: NodeIndex,
        body: NodeIndex,
    },
    MatchStmt {
        scrutinee: NodeIndex,
        arms: NodeList,
    },
    MatchArm {
        /// Empty for the default arm
        patterns: NodeList,
        /// Binding introduced by `case T as name`
        binding: Option<Atom>,
        body: NodeIndex,
    },

    // =====================================================================
    // Support
    // =====================================================================
    Attr {
        name: Atom,
        args: NodeList,
    },
    /// Placeholder left where a comptime construct was evaluated away
    Noop,
    /// Placeholder produced by error recovery
    Error,
}

impl AstKind {
    /// True for nodes that appear in type position.
    pub const fn is_type_syntax(&self) -> bool {
        matches!(
            self,
            AstKind::PrimitiveType { .. }
                | AstKind::VoidType
                | AstKind::StringType
                | AstKind::AutoType
                | AstKind::PointerType { .. }
                | AstKind::ReferenceType { .. }
                | AstKind::ArrayType { .. }
                | AstKind::TupleType { .. }
                | AstKind::UnionType { .. }
                | AstKind::OptionalType { .. }
                | AstKind::FuncType { .. }
                | AstKind::ResultType { .. }
        )
    }

    /// True for declarations that introduce a name into a scope.
    pub const fn is_declaration(&self) -> bool {
        matches!(
            self,
            AstKind::FuncDecl { .. }
                | AstKind::VarDecl { .. }
                | AstKind::TypeDecl { .. }
                | AstKind::StructDecl { .. }
                | AstKind::ClassDecl { .. }
                | AstKind::InterfaceDecl { .. }
                | AstKind::EnumDecl { .. }
                | AstKind::ExceptionDecl { .. }
                | AstKind::MacroDecl { .. }
                | AstKind::TestDecl { .. }
                | AstKind::FuncParam { .. }
                | AstKind::GenericParam { .. }
                | AstKind::FieldDecl { .. }
                | AstKind::EnumOption { .. }
        )
    }

    /// Name introduced by a declaration node, when it has one.
    pub fn decl_name(&self) -> Option<Atom> {
        match self {
            AstKind::FuncDecl { name, .. }
            | AstKind::TypeDecl { name, .. }
            | AstKind::StructDecl { name, .. }
            | AstKind::ClassDecl { name, .. }
            | AstKind::InterfaceDecl { name, .. }
            | AstKind::EnumDecl { name, .. }
            | AstKind::ExceptionDecl { name, .. }
            | AstKind::MacroDecl { name, .. }
            | AstKind::FuncParam { name, .. }
            | AstKind::GenericParam { name, .. }
            | AstKind::FieldDecl { name, .. }
            | AstKind::EnumOption { name, .. } => Some(*name),
            _ => None,
        }
    }

    /// Short tag name, used by the S-expression dump and diagnostics.
    pub const fn tag_name(&self) -> &'static str {
        match self {
            AstKind::Program { .. } => "program",
            AstKind::ModuleDecl { .. } => "module",
            AstKind::ImportDecl { .. } => "import",
            AstKind::ImportEntity { .. } => "import-entity",
            AstKind::FuncDecl { .. } => "func",
            AstKind::FuncParam { .. } => "param",
            AstKind::GenericParam { .. } => "generic-param",
            AstKind::VarDecl { .. } => "var",
            AstKind::TypeDecl { .. } => "type",
            AstKind::StructDecl { .. } => "struct",
            AstKind::ClassDecl { .. } => "class",
            AstKind::InterfaceDecl { .. } => "interface",
            AstKind::EnumDecl { .. } => "enum",
            AstKind::EnumOption { .. } => "enum-option",
            AstKind::FieldDecl { .. } => "field",
            AstKind::ExceptionDecl { .. } => "exception",
            AstKind::MacroDecl { .. } => "macro",
            AstKind::TestDecl { .. } => "test",
            AstKind::PrimitiveType { .. } => "prim-type",
            AstKind::VoidType => "void-type",
            AstKind::StringType => "string-type",
            AstKind::AutoType => "auto-type",
            AstKind::PointerType { .. } => "ptr-type",
            AstKind::ReferenceType { .. } => "ref-type",
            AstKind::ArrayType { .. } => "array-type",
            AstKind::TupleType { .. } => "tuple-type",
            AstKind::UnionType { .. } => "union-type",
            AstKind::OptionalType { .. } => "optional-type",
            AstKind::FuncType { .. } => "func-type",
            AstKind::ResultType { .. } => "result-type",
            AstKind::NullLit => "null",
            AstKind::BoolLit { .. } => "bool",
            AstKind::IntLit { .. } => "int",
            AstKind::FloatLit { .. } => "float",
            AstKind::CharLit { .. } => "char",
            AstKind::StringLit { .. } => "string",
            AstKind::Identifier { .. } => "ident",
            AstKind::Path { .. } => "path",
            AstKind::PathElement { .. } => "path-elem",
            AstKind::MemberExpr { .. } => "member",
            AstKind::CallExpr { .. } => "call",
            AstKind::MacroCallExpr { .. } => "macro-call",
            AstKind::IndexExpr { .. } => "index",
            AstKind::UnaryExpr { .. } => "unary",
            AstKind::BinaryExpr { .. } => "binary",
            AstKind::AssignExpr { .. } => "assign",
            AstKind::TernaryExpr { .. } => "ternary",
            AstKind::CastExpr { .. } => "cast",
            AstKind::TupleExpr { .. } => "tuple",
            AstKind::ArrayExpr { .. } => "array",
            AstKind::StructExpr { .. } => "struct-expr",
            AstKind::FieldInit { .. } => "field-init",
            AstKind::ClosureExpr { .. } => "closure",
            AstKind::StringExpr { .. } => "string-expr",
            AstKind::GroupExpr { .. } => "group",
            AstKind::NewExpr { .. } => "new",
            AstKind::Substitute { .. } => "substitute",
            AstKind::AsmExpr { .. } => "asm",
            AstKind::Block { .. } => "block",
            AstKind::ExprStmt { .. } => "expr-stmt",
            AstKind::ReturnStmt { .. } => "return",
            AstKind::BreakStmt => "break",
            AstKind::ContinueStmt => "continue",
            AstKind::DeferStmt { .. } => "defer",
            AstKind::YieldStmt { .. } => "yield",
            AstKind::RaiseStmt { .. } => "raise",
            AstKind::IfStmt { .. } => "if",
            AstKind::WhileStmt { .. } => "while",
            AstKind::ForStmt { .. } => "for",
            AstKind::MatchStmt { .. } => "match",
            AstKind::MatchArm { .. } => "match-arm",
            AstKind::Attr { .. } => "attr",
            AstKind::Noop => "noop",
            AstKind::Error => "error",
        }
    }
}
