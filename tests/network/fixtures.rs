//! Shared templates and condition builders.

use reticle_engine::{Condition, Engine, EngineConfig, Expr, FactPattern, FieldRef};
use reticle_foundation::{EntityRef, Type, Value};
use reticle_storage::{SlotKey, SlotSchema, TemplateId};

/// Three one-slot templates `a`, `b`, `c`, each with an integer slot `x`.
pub struct Abc {
    pub engine: Engine,
    pub a: TemplateId,
    pub b: TemplateId,
    pub c: TemplateId,
}

impl Abc {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let mut engine = Engine::with_config(config);
        let x = engine.intern("x");
        let mut template = |name: &str| {
            engine
                .deftemplate(name, vec![SlotSchema::single(x, Type::Int)])
                .unwrap()
        };
        let a = template("a");
        let b = template("b");
        let c = template("c");
        Self { engine, a, b, c }
    }

    pub fn template(&self, kind: u8) -> TemplateId {
        match kind % 3 {
            0 => self.a,
            1 => self.b,
            _ => self.c,
        }
    }

    pub fn assert(&mut self, template: TemplateId, x: i64) -> EntityRef {
        self.engine
            .assert_fact(template, vec![Value::Int(x)])
            .unwrap()
            .unwrap()
    }
}

pub fn x() -> FieldRef {
    FieldRef::slot(SlotKey::Position(0))
}

/// `(eq <left pattern>.x <right>.x)`
pub fn same_x(left: u16) -> Expr {
    Expr::call("eq", vec![Expr::left(left, x()), Expr::right(0, x())]).unwrap()
}

pub fn pattern(template: TemplateId) -> Condition {
    Condition::fact(FactPattern::new(template))
}

/// A condition on `template` whose `x` equals that of the pattern at `left`.
pub fn joined(template: TemplateId, left: u16) -> Condition {
    pattern(template).with_test(same_x(left))
}

/// Same as [`joined`], with hashed memories on `x`.
pub fn hashed(template: TemplateId, left: u16) -> Condition {
    joined(template, left).with_hash(vec![Expr::left(left, x())], vec![Expr::right(0, x())])
}
