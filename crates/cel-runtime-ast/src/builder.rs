//! Programmatic construction of expression trees.
//!
//! The builder hands out increasing node IDs and a zero-width span; callers
//! that track source positions attach them with [`Spanned::at`]. The macro
//! helpers (`all`, `exists`, `exists_one`, `map`, `filter`) produce the same
//! comprehension shapes a CEL parser emits after macro expansion.

use std::cell::Cell;

use crate::{BinaryOp, Expr, MapEntry, Spanned, SpannedExpr, StructField, UnaryOp};

/// Accumulator variable used by expanded macros.
pub const ACCU_VAR: &str = "__result__";

/// Builds [`SpannedExpr`] trees with unique IDs.
#[derive(Debug)]
pub struct AstBuilder {
    next_id: Cell<i64>,
}

impl Default for AstBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AstBuilder {
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(1),
        }
    }

    fn node(&self, expr: Expr) -> SpannedExpr {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        Spanned::new(id, expr, 0..0)
    }

    // ==================== Literals ====================

    pub fn null(&self) -> SpannedExpr {
        self.node(Expr::Null)
    }

    pub fn bool(&self, value: bool) -> SpannedExpr {
        self.node(Expr::Bool(value))
    }

    pub fn int(&self, value: i64) -> SpannedExpr {
        self.node(Expr::Int(value))
    }

    pub fn uint(&self, value: u64) -> SpannedExpr {
        self.node(Expr::UInt(value))
    }

    pub fn float(&self, value: f64) -> SpannedExpr {
        self.node(Expr::Float(value))
    }

    pub fn string(&self, value: impl Into<String>) -> SpannedExpr {
        self.node(Expr::String(value.into()))
    }

    pub fn bytes(&self, value: impl Into<Vec<u8>>) -> SpannedExpr {
        self.node(Expr::Bytes(value.into()))
    }

    pub fn ident(&self, name: impl Into<String>) -> SpannedExpr {
        self.node(Expr::Ident(name.into()))
    }

    // ==================== Collections ====================

    pub fn list(&self, elements: Vec<SpannedExpr>) -> SpannedExpr {
        self.node(Expr::List(elements))
    }

    pub fn map(&self, entries: Vec<(SpannedExpr, SpannedExpr)>) -> SpannedExpr {
        let entries = entries
            .into_iter()
            .map(|(key, value)| MapEntry { key, value })
            .collect();
        self.node(Expr::Map(entries))
    }

    // ==================== Operations ====================

    pub fn unary(&self, op: UnaryOp, expr: SpannedExpr) -> SpannedExpr {
        self.node(Expr::Unary {
            op,
            expr: Box::new(expr),
        })
    }

    pub fn binary(&self, op: BinaryOp, left: SpannedExpr, right: SpannedExpr) -> SpannedExpr {
        self.node(Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn ternary(
        &self,
        cond: SpannedExpr,
        then_expr: SpannedExpr,
        else_expr: SpannedExpr,
    ) -> SpannedExpr {
        self.node(Expr::Ternary {
            cond: Box::new(cond),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
        })
    }

    // ==================== Access ====================

    pub fn member(&self, expr: SpannedExpr, field: impl Into<String>) -> SpannedExpr {
        self.node(Expr::Member {
            expr: Box::new(expr),
            field: field.into(),
        })
    }

    pub fn index(&self, expr: SpannedExpr, index: SpannedExpr) -> SpannedExpr {
        self.node(Expr::Index {
            expr: Box::new(expr),
            index: Box::new(index),
        })
    }

    /// Global call: `function(args)`.
    pub fn call(&self, function: impl Into<String>, args: Vec<SpannedExpr>) -> SpannedExpr {
        self.node(Expr::Call {
            target: None,
            function: function.into(),
            args,
        })
    }

    /// Receiver-style call: `target.function(args)`.
    pub fn method(
        &self,
        target: SpannedExpr,
        function: impl Into<String>,
        args: Vec<SpannedExpr>,
    ) -> SpannedExpr {
        self.node(Expr::Call {
            target: Some(Box::new(target)),
            function: function.into(),
            args,
        })
    }

    pub fn message(
        &self,
        type_name: impl Into<String>,
        fields: Vec<(&str, SpannedExpr)>,
    ) -> SpannedExpr {
        let fields = fields
            .into_iter()
            .map(|(name, value)| StructField {
                name: name.to_string(),
                value,
            })
            .collect();
        self.node(Expr::Struct {
            type_name: type_name.into(),
            fields,
        })
    }

    // ==================== Macros ====================

    /// `has(expr.field)`
    pub fn has(&self, expr: SpannedExpr, field: impl Into<String>) -> SpannedExpr {
        self.node(Expr::Has {
            expr: Box::new(expr),
            field: field.into(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn comprehension(
        &self,
        iter_var: &str,
        iter_range: SpannedExpr,
        accu_init: SpannedExpr,
        loop_condition: SpannedExpr,
        loop_step: SpannedExpr,
        result: SpannedExpr,
    ) -> SpannedExpr {
        self.node(Expr::Comprehension {
            iter_var: iter_var.to_string(),
            iter_range: Box::new(iter_range),
            accu_var: ACCU_VAR.to_string(),
            accu_init: Box::new(accu_init),
            loop_condition: Box::new(loop_condition),
            loop_step: Box::new(loop_step),
            result: Box::new(result),
        })
    }

    /// `range.all(var, predicate)`
    pub fn all(&self, range: SpannedExpr, var: &str, predicate: SpannedExpr) -> SpannedExpr {
        let step = self.binary(BinaryOp::And, predicate, self.ident(ACCU_VAR));
        self.comprehension(
            var,
            range,
            self.bool(true),
            self.ident(ACCU_VAR),
            step,
            self.ident(ACCU_VAR),
        )
    }

    /// `range.exists(var, predicate)`
    pub fn exists(&self, range: SpannedExpr, var: &str, predicate: SpannedExpr) -> SpannedExpr {
        let condition = self.unary(UnaryOp::Not, self.ident(ACCU_VAR));
        let step = self.binary(BinaryOp::Or, predicate, self.ident(ACCU_VAR));
        self.comprehension(
            var,
            range,
            self.bool(false),
            condition,
            step,
            self.ident(ACCU_VAR),
        )
    }

    /// `range.exists_one(var, predicate)`
    pub fn exists_one(
        &self,
        range: SpannedExpr,
        var: &str,
        predicate: SpannedExpr,
    ) -> SpannedExpr {
        let condition = self.binary(BinaryOp::Le, self.ident(ACCU_VAR), self.int(1));
        let incremented = self.binary(BinaryOp::Add, self.ident(ACCU_VAR), self.int(1));
        let step = self.ternary(predicate, incremented, self.ident(ACCU_VAR));
        let result = self.binary(BinaryOp::Eq, self.ident(ACCU_VAR), self.int(1));
        self.comprehension(var, range, self.int(0), condition, step, result)
    }

    /// `range.map(var, transform)`
    pub fn map_macro(
        &self,
        range: SpannedExpr,
        var: &str,
        transform: SpannedExpr,
    ) -> SpannedExpr {
        let step = self.binary(
            BinaryOp::Add,
            self.ident(ACCU_VAR),
            self.list(vec![transform]),
        );
        self.comprehension(
            var,
            range,
            self.list(vec![]),
            self.bool(true),
            step,
            self.ident(ACCU_VAR),
        )
    }

    /// `range.filter(var, predicate)`
    pub fn filter(&self, range: SpannedExpr, var: &str, predicate: SpannedExpr) -> SpannedExpr {
        let appended = self.binary(
            BinaryOp::Add,
            self.ident(ACCU_VAR),
            self.list(vec![self.ident(var)]),
        );
        let step = self.ternary(predicate, appended, self.ident(ACCU_VAR));
        self.comprehension(
            var,
            range,
            self.list(vec![]),
            self.bool(true),
            step,
            self.ident(ACCU_VAR),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let b = AstBuilder::new();
        let first = b.int(1);
        let second = b.int(2);
        assert!(second.id > first.id);
    }

    #[test]
    fn test_exists_expands_to_comprehension() {
        let b = AstBuilder::new();
        let expr = b.exists(b.ident("xs"), "x", b.bool(true));
        match expr.node {
            Expr::Comprehension {
                iter_var,
                accu_var,
                accu_init,
                ..
            } => {
                assert_eq!(iter_var, "x");
                assert_eq!(accu_var, ACCU_VAR);
                assert_eq!(accu_init.node, Expr::Bool(false));
            }
            other => panic!("expected comprehension, got {:?}", other),
        }
    }

    #[test]
    fn test_message_fields_keep_order() {
        let b = AstBuilder::new();
        let expr = b.message("Point", vec![("x", b.int(1)), ("y", b.int(2))]);
        match expr.node {
            Expr::Struct { type_name, fields } => {
                assert_eq!(type_name, "Point");
                let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
                assert_eq!(names, vec!["x", "y"]);
            }
            other => panic!("expected struct, got {:?}", other),
        }
    }
}
