//! Operators: precedence, token mapping, canonical overload names.
//!
//! Every overloadable operator has a canonical member name (`op_add`,
//! `op_idx`, ...) under which a type stores its implementation. The names
//! are interned once so dispatch reduces to atom equality.

use cxy_lexer::TokenKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    // Binary
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    BAnd,
    BOr,
    BXor,
    Range,
    Eq,
    Ne,
    Is,
    Lt,
    Gt,
    Leq,
    Geq,
    LAnd,
    LOr,
    Catch,
    // Unary
    Minus,
    Plus,
    Deref,
    Not,
    Compl,
    Refof,
    Move,
    Spread,
    Await,
    Delete,
    Ptrof,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
    // Assignment (the base op of a compound assignment, Assign for `=`)
    Assign,
    // Overload-only
    Call,
    Index,
    IndexAssign,
    Str,
    Init,
    Deinit,
    Copy,
    Destructor,
    Hash,
    Truthy,
}

/// Binary precedence levels, tightest first. The ladder:
/// multiplicative, additive, shift, range, comparison, equality,
/// bitwise and/xor/or, logical and/or, catch.
impl Operator {
    pub const MAX_BINARY_PRECEDENCE: u8 = 13;

    /// Precedence of a binary operator; lower binds tighter.
    pub const fn binary_precedence(self) -> Option<u8> {
        Some(match self {
            Operator::Mul | Operator::Div | Operator::Rem => 1,
            Operator::Add | Operator::Sub => 2,
            Operator::Shl | Operator::Shr => 3,
            Operator::Range => 4,
            Operator::Lt | Operator::Gt | Operator::Leq | Operator::Geq => 5,
            Operator::Eq | Operator::Ne | Operator::Is => 6,
            Operator::BAnd => 7,
            Operator::BXor => 8,
            Operator::BOr => 9,
            Operator::LAnd => 10,
            Operator::LOr => 11,
            Operator::Catch => 12,
            _ => return None,
        })
    }

    pub fn binary_from_token(kind: TokenKind) -> Option<Operator> {
        Some(match kind {
            TokenKind::Plus => Operator::Add,
            TokenKind::Minus => Operator::Sub,
            TokenKind::Star => Operator::Mul,
            TokenKind::Slash => Operator::Div,
            TokenKind::Percent => Operator::Rem,
            TokenKind::Shl => Operator::Shl,
            TokenKind::Shr => Operator::Shr,
            TokenKind::Amp => Operator::BAnd,
            TokenKind::Pipe => Operator::BOr,
            TokenKind::Caret => Operator::BXor,
            TokenKind::DotDot => Operator::Range,
            TokenKind::EqEq => Operator::Eq,
            TokenKind::NotEq => Operator::Ne,
            TokenKind::Is => Operator::Is,
            TokenKind::Lt => Operator::Lt,
            TokenKind::Gt => Operator::Gt,
            TokenKind::LtEq => Operator::Leq,
            TokenKind::GtEq => Operator::Geq,
            TokenKind::AmpAmp => Operator::LAnd,
            TokenKind::PipePipe => Operator::LOr,
            TokenKind::Catch => Operator::Catch,
            _ => return None,
        })
    }

    /// The base operator of a compound assignment token; `Assign` for `=`.
    pub fn assignment_from_token(kind: TokenKind) -> Option<Operator> {
        Some(match kind {
            TokenKind::Assign => Operator::Assign,
            TokenKind::PlusEq => Operator::Add,
            TokenKind::MinusEq => Operator::Sub,
            TokenKind::StarEq => Operator::Mul,
            TokenKind::SlashEq => Operator::Div,
            TokenKind::PercentEq => Operator::Rem,
            TokenKind::AmpEq => Operator::BAnd,
            TokenKind::PipeEq => Operator::BOr,
            TokenKind::CaretEq => Operator::BXor,
            TokenKind::ShlEq => Operator::Shl,
            TokenKind::ShrEq => Operator::Shr,
            _ => return None,
        })
    }

    pub fn prefix_from_token(kind: TokenKind) -> Option<Operator> {
        Some(match kind {
            TokenKind::Minus => Operator::Minus,
            TokenKind::Plus => Operator::Plus,
            TokenKind::Star => Operator::Deref,
            TokenKind::Bang => Operator::Not,
            TokenKind::Tilde => Operator::Compl,
            TokenKind::Amp => Operator::Refof,
            TokenKind::AmpAmp => Operator::Move,
            TokenKind::Ellipsis => Operator::Spread,
            TokenKind::Await => Operator::Await,
            TokenKind::Delete => Operator::Delete,
            TokenKind::Ptrof => Operator::Ptrof,
            TokenKind::PlusPlus => Operator::PreInc,
            TokenKind::MinusMinus => Operator::PreDec,
            _ => return None,
        })
    }

    pub fn postfix_from_token(kind: TokenKind) -> Option<Operator> {
        Some(match kind {
            TokenKind::PlusPlus => Operator::PostInc,
            TokenKind::MinusMinus => Operator::PostDec,
            _ => return None,
        })
    }

    /// Source spelling, for diagnostics.
    pub const fn symbol(self) -> &'static str {
        match self {
            Operator::Add | Operator::Plus => "+",
            Operator::Sub | Operator::Minus => "-",
            Operator::Mul | Operator::Deref => "*",
            Operator::Div => "/",
            Operator::Rem => "%",
            Operator::Shl => "<<",
            Operator::Shr => ">>",
            Operator::BAnd | Operator::Refof => "&",
            Operator::BOr => "|",
            Operator::BXor => "^",
            Operator::Range => "..",
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Is => "is",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Leq => "<=",
            Operator::Geq => ">=",
            Operator::LAnd => "&&",
            Operator::LOr => "||",
            Operator::Catch => "catch",
            Operator::Not => "!",
            Operator::Compl => "~",
            Operator::Move => "&&",
            Operator::Spread => "...",
            Operator::Await => "await",
            Operator::Delete => "delete",
            Operator::Ptrof => "ptrof",
            Operator::PreInc | Operator::PostInc => "++",
            Operator::PreDec | Operator::PostDec => "--",
            Operator::Assign => "=",
            Operator::Call => "()",
            Operator::Index => "[]",
            Operator::IndexAssign => "=[]",
            Operator::Str => "str",
            Operator::Init => "init",
            Operator::Deinit => "deinit",
            Operator::Copy => "copy",
            Operator::Destructor => "destructor",
            Operator::Hash => "hash",
            Operator::Truthy => "!!",
        }
    }

    /// Canonical member name under which the overload is stored.
    pub const fn overload_name(self) -> &'static str {
        match self {
            Operator::Add => "op_add",
            Operator::Sub => "op_sub",
            Operator::Mul => "op_mul",
            Operator::Div => "op_div",
            Operator::Rem => "op_rem",
            Operator::Shl => "op_lshift",
            Operator::Shr => "op_rshift",
            Operator::BAnd => "op_and",
            Operator::BOr => "op_or",
            Operator::BXor => "op_xor",
            Operator::Range => "op_range",
            Operator::Eq => "op_eq",
            Operator::Ne => "op_neq",
            Operator::Is => "op_is",
            Operator::Lt => "op_lt",
            Operator::Gt => "op_gt",
            Operator::Leq => "op_leq",
            Operator::Geq => "op_geq",
            Operator::LAnd => "op_land",
            Operator::LOr => "op_lor",
            Operator::Catch => "op_catch",
            Operator::Minus => "op_neg",
            Operator::Plus => "op_pos",
            Operator::Deref => "op_deref",
            Operator::Not => "op_lnot",
            Operator::Compl => "op_bnot",
            Operator::Refof => "op_refof",
            Operator::Move => "op_move",
            Operator::Spread => "op_spread",
            Operator::Await => "op_await",
            Operator::Delete => "op_delete",
            Operator::Ptrof => "op_ptrof",
            Operator::PreInc => "op_pre_inc",
            Operator::PreDec => "op_pre_dec",
            Operator::PostInc => "op_inc",
            Operator::PostDec => "op_dec",
            Operator::Assign => "op_assign",
            Operator::Call => "op_call",
            Operator::Index => "op_idx",
            Operator::IndexAssign => "op_idx_assign",
            Operator::Str => "op_str",
            Operator::Init => "op_init",
            Operator::Deinit => "op_deinit",
            Operator::Copy => "op_copy",
            Operator::Destructor => "op_destructor",
            Operator::Hash => "op_hash",
            Operator::Truthy => "op_truthy",
        }
    }

    /// True for operators whose operand type may define an overload.
    pub const fn is_overloadable(self) -> bool {
        !matches!(self, Operator::Is | Operator::Catch | Operator::Move | Operator::Refof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_orders_mul_before_add_before_catch() {
        let mul = Operator::Mul.binary_precedence().unwrap();
        let add = Operator::Add.binary_precedence().unwrap();
        let range = Operator::Range.binary_precedence().unwrap();
        let cmp = Operator::Lt.binary_precedence().unwrap();
        let catch = Operator::Catch.binary_precedence().unwrap();
        assert!(mul < add);
        assert!(add < range);
        assert!(range < cmp);
        assert!(cmp < catch);
        assert!(catch <= Operator::MAX_BINARY_PRECEDENCE);
    }

    #[test]
    fn unary_operators_have_no_binary_precedence() {
        assert_eq!(Operator::Not.binary_precedence(), None);
        assert_eq!(Operator::Await.binary_precedence(), None);
    }
}
