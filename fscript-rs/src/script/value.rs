//! Runtime value type for the FScript language.
//!
//! FScript is dynamically typed but strict: operators accept only the operand
//! combinations listed in the type table below, and a variable keeps the type
//! it was declared with.  Booleans are encoded as the integers `1` and `0`.
//!
//! | Op | int,int | double,double | int/double mixed | string involved |
//! |----|---------|---------------|------------------|-----------------|
//! | `+` | int | double | double | concatenation |
//! | `-` `*` `/` | int | double | double | error |
//! | `%` `&&` `\|\|` | int | error | error | error |
//! | `==` `!=` | equality | equality | error | str/str only |
//! | `<` `<=` `>` `>=` | order | order | error | str/str only |

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

// ── HostValue ─────────────────────────────────────────────────────────────────

/// Payload carried by an `object` value.
#[derive(Clone)]
pub enum HostValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    /// Arbitrary host data.  Compared by identity.
    Native {
        type_name: &'static str,
        value: Rc<dyn Any>,
    },
}

impl HostValue {
    /// Wrap arbitrary host data.
    pub fn native<T: Any>(value: T) -> Self {
        HostValue::Native {
            type_name: std::any::type_name::<T>(),
            value: Rc::new(value),
        }
    }

    /// Borrow native data as `T`, if that is what this payload holds.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            HostValue::Native { value, .. } => value.downcast_ref(),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Bool(_) => "bool",
            HostValue::Int(_) => "int",
            HostValue::Double(_) => "double",
            HostValue::Str(_) => "string",
            HostValue::Native { type_name, .. } => type_name,
        }
    }

    /// `true` if a plain script value of `value`'s type may replace this payload.
    fn same_kind(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (HostValue::Int(_), Value::Int(_))
                | (HostValue::Double(_), Value::Double(_))
                | (HostValue::Str(_), Value::Str(_))
        )
    }

    /// Compare the payload against a plain (non-object) script value.
    fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (HostValue::Int(a), Value::Int(b)) => a == b,
            (HostValue::Double(a), Value::Double(b)) => a == b,
            (HostValue::Str(a), Value::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostValue::Bool(a), HostValue::Bool(b)) => a == b,
            (HostValue::Int(a), HostValue::Int(b)) => a == b,
            (HostValue::Double(a), HostValue::Double(b)) => a == b,
            (HostValue::Str(a), HostValue::Str(b)) => a == b,
            (HostValue::Native { value: a, .. }, HostValue::Native { value: b, .. }) => {
                Rc::ptr_eq(a, b)
            }
            _ => false,
        }
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Bool(b) => write!(f, "Bool({b})"),
            HostValue::Int(n) => write!(f, "Int({n})"),
            HostValue::Double(x) => write!(f, "Double({x})"),
            HostValue::Str(s) => write!(f, "Str({s:?})"),
            HostValue::Native { type_name, .. } => write!(f, "Native({type_name})"),
        }
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Bool(b) => write!(f, "{b}"),
            HostValue::Int(n) => write!(f, "{n}"),
            HostValue::Double(x) => fmt_double(*x, f),
            HostValue::Str(s) => write!(f, "{s}"),
            HostValue::Native { type_name, .. } => write!(f, "<{type_name}>"),
        }
    }
}

// ── ValueKind ─────────────────────────────────────────────────────────────────

/// Declared type of a variable or function parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Int,
    Double,
    Str,
    Object,
}

impl ValueKind {
    /// The value a freshly declared variable of this kind holds.
    pub fn zero(self) -> Value {
        match self {
            ValueKind::Int => Value::Int(0),
            ValueKind::Double => Value::Double(0.0),
            ValueKind::Str => Value::Str(String::new()),
            ValueKind::Object => Value::Object(None),
        }
    }

    /// The keyword that declares this kind.
    pub fn keyword(self) -> &'static str {
        match self {
            ValueKind::Int => "int",
            ValueKind::Double => "double",
            ValueKind::Str => "string",
            ValueKind::Object => "object",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

// ── Value ─────────────────────────────────────────────────────────────────────

/// An FScript runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Double(f64),
    Str(String),
    /// A host-object wrapper; `None` is script-level `null`.
    Object(Option<HostValue>),
}

/// An operator was applied to operands it does not accept.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OpError {
    #[error("Type mismatch for operator {op}: {left} and {right}")]
    Binary {
        op: &'static str,
        left: String,
        right: String,
    },
    #[error("Type mismatch for unary {op}: {operand}")]
    Unary { op: &'static str, operand: String },
    #[error("division by zero")]
    DivisionByZero,
}

/// The stored type of a variable does not accept the assigned value.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Incompatible types: cannot assign {found} to {expected}")]
pub struct Incompatible {
    pub expected: String,
    pub found: String,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Double(x) => fmt_double(*x, f),
            Value::Str(s) => write!(f, "{s}"),
            Value::Object(Some(p)) => write!(f, "{p}"),
            Value::Object(None) => f.write_str("null"),
        }
    }
}

/// Whole doubles keep one decimal place so they read as doubles (`1.0`).
fn fmt_double(x: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if x.fract() == 0.0 && x.abs() < 1e15 {
        write!(f, "{x:.1}")
    } else {
        write!(f, "{x}")
    }
}

const TRUE: Value = Value::Int(1);
const FALSE: Value = Value::Int(0);

fn truth(b: bool) -> Value {
    if b {
        TRUE
    } else {
        FALSE
    }
}

impl Value {
    /// Script-level `null`.
    pub fn null() -> Self {
        Value::Object(None)
    }

    /// Wrap a host payload as an `object` value.
    pub fn object(payload: HostValue) -> Self {
        Value::Object(Some(payload))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Int(_) => ValueKind::Int,
            Value::Double(_) => ValueKind::Double,
            Value::Str(_) => ValueKind::Str,
            Value::Object(_) => ValueKind::Object,
        }
    }

    /// Type name used in diagnostics, e.g. `int` or `object<string>`.
    pub fn type_name(&self) -> String {
        match self {
            Value::Object(Some(p)) => format!("object<{}>", p.type_name()),
            Value::Object(None) => "object<null>".to_owned(),
            other => other.kind().keyword().to_owned(),
        }
    }

    /// Truth value for `if`/`while`: an integer, or an object holding a
    /// bool or an integer.  `None` for anything else.
    pub fn truth(&self) -> Option<bool> {
        match self {
            Value::Int(n) => Some(*n != 0),
            Value::Object(Some(HostValue::Bool(b))) => Some(*b),
            Value::Object(Some(HostValue::Int(n))) => Some(*n != 0),
            _ => None,
        }
    }

    /// Decide what a variable currently holding `self` stores when `value`
    /// is assigned to it.
    ///
    /// With `wrap` set, an `object` variable that is still `null` accepts
    /// anything, and one holding a payload accepts a plain value of the
    /// payload's type; both are re-wrapped.  Otherwise the runtime types must
    /// be equal.
    pub fn coerce_assign(&self, value: Value, wrap: bool) -> Result<Value, Incompatible> {
        if self.kind() == value.kind() {
            return Ok(value);
        }
        if wrap {
            if let Value::Object(current) = self {
                let accepts = match current {
                    None => true,
                    Some(payload) => payload.same_kind(&value),
                };
                if accepts {
                    return Ok(Value::Object(Some(value.into_host())));
                }
            }
        }
        Err(Incompatible {
            expected: self.type_name(),
            found: value.type_name(),
        })
    }

    /// Convert a plain script value into an object payload.
    fn into_host(self) -> HostValue {
        match self {
            Value::Int(n) => HostValue::Int(n),
            Value::Double(x) => HostValue::Double(x),
            Value::Str(s) => HostValue::Str(s),
            Value::Object(Some(p)) => p,
            Value::Object(None) => HostValue::native(()),
        }
    }

    fn mismatch(op: &'static str, l: &Value, r: &Value) -> OpError {
        OpError::Binary {
            op,
            left: l.type_name(),
            right: r.type_name(),
        }
    }

    // ── Arithmetic ───────────────────────────────────────────────────────────

    pub fn arith_add(&self, rhs: &Value) -> Result<Value, OpError> {
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_add(*b))),
            (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a + b)),
            (Value::Str(_), _) | (_, Value::Str(_)) => Ok(Value::Str(format!("{self}{rhs}"))),
            (Value::Double(a), Value::Int(b)) => Ok(Value::Double(a + *b as f64)),
            (Value::Int(a), Value::Double(b)) => Ok(Value::Double(*a as f64 + b)),
            _ => Err(Self::mismatch("+", self, rhs)),
        }
    }

    pub fn arith_sub(&self, rhs: &Value) -> Result<Value, OpError> {
        self.numeric("-", rhs, i64::wrapping_sub, |a, b| a - b)
    }

    pub fn arith_mul(&self, rhs: &Value) -> Result<Value, OpError> {
        self.numeric("*", rhs, i64::wrapping_mul, |a, b| a * b)
    }

    pub fn arith_div(&self, rhs: &Value) -> Result<Value, OpError> {
        if let (Value::Int(_), Value::Int(0)) = (self, rhs) {
            return Err(OpError::DivisionByZero);
        }
        self.numeric("/", rhs, i64::wrapping_div, |a, b| a / b)
    }

    pub fn arith_rem(&self, rhs: &Value) -> Result<Value, OpError> {
        match (self, rhs) {
            (Value::Int(_), Value::Int(0)) => Err(OpError::DivisionByZero),
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_rem(*b))),
            _ => Err(Self::mismatch("%", self, rhs)),
        }
    }

    fn numeric(
        &self,
        op: &'static str,
        rhs: &Value,
        int: fn(i64, i64) -> i64,
        double: fn(f64, f64) -> f64,
    ) -> Result<Value, OpError> {
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(int(*a, *b))),
            (Value::Double(a), Value::Double(b)) => Ok(Value::Double(double(*a, *b))),
            (Value::Double(a), Value::Int(b)) => Ok(Value::Double(double(*a, *b as f64))),
            (Value::Int(a), Value::Double(b)) => Ok(Value::Double(double(*a as f64, *b))),
            _ => Err(Self::mismatch(op, self, rhs)),
        }
    }

    // ── Logic ────────────────────────────────────────────────────────────────

    pub fn logic_and(&self, rhs: &Value) -> Result<Value, OpError> {
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(truth(*a != 0 && *b != 0)),
            _ => Err(Self::mismatch("&&", self, rhs)),
        }
    }

    pub fn logic_or(&self, rhs: &Value) -> Result<Value, OpError> {
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(truth(*a != 0 || *b != 0)),
            _ => Err(Self::mismatch("||", self, rhs)),
        }
    }

    // ── Comparison ───────────────────────────────────────────────────────────

    fn equals(&self, op: &'static str, rhs: &Value) -> Result<bool, OpError> {
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(a == b),
            (Value::Double(a), Value::Double(b)) => Ok(a == b),
            (Value::Str(a), Value::Str(b)) => Ok(a == b),
            (Value::Object(a), Value::Object(b)) => Ok(a == b),
            (Value::Object(Some(p)), plain) | (plain, Value::Object(Some(p))) => {
                Ok(p.matches(plain))
            }
            (Value::Object(None), _) | (_, Value::Object(None)) => Ok(false),
            _ => Err(Self::mismatch(op, self, rhs)),
        }
    }

    pub fn cmp_eq(&self, rhs: &Value) -> Result<Value, OpError> {
        self.equals("==", rhs).map(truth)
    }

    pub fn cmp_ne(&self, rhs: &Value) -> Result<Value, OpError> {
        self.equals("!=", rhs).map(|b| truth(!b))
    }

    fn order(&self, op: &'static str, rhs: &Value) -> Result<std::cmp::Ordering, OpError> {
        let ord = match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => return Err(Self::mismatch(op, self, rhs)),
        };
        // NaN compares as neither less nor greater.
        Ok(ord.unwrap_or(std::cmp::Ordering::Equal))
    }

    pub fn cmp_lt(&self, rhs: &Value) -> Result<Value, OpError> {
        if let (Value::Double(a), Value::Double(b)) = (self, rhs) {
            return Ok(truth(a < b));
        }
        self.order("<", rhs).map(|o| truth(o.is_lt()))
    }

    pub fn cmp_le(&self, rhs: &Value) -> Result<Value, OpError> {
        if let (Value::Double(a), Value::Double(b)) = (self, rhs) {
            return Ok(truth(a <= b));
        }
        self.order("<=", rhs).map(|o| truth(o.is_le()))
    }

    pub fn cmp_gt(&self, rhs: &Value) -> Result<Value, OpError> {
        if let (Value::Double(a), Value::Double(b)) = (self, rhs) {
            return Ok(truth(a > b));
        }
        self.order(">", rhs).map(|o| truth(o.is_gt()))
    }

    pub fn cmp_ge(&self, rhs: &Value) -> Result<Value, OpError> {
        if let (Value::Double(a), Value::Double(b)) = (self, rhs) {
            return Ok(truth(a >= b));
        }
        self.order(">=", rhs).map(|o| truth(o.is_ge()))
    }

    // ── Unary ────────────────────────────────────────────────────────────────

    pub fn arith_neg(&self) -> Result<Value, OpError> {
        match self {
            Value::Int(n) => Ok(Value::Int(n.wrapping_neg())),
            Value::Double(x) => Ok(Value::Double(-x)),
            other => Err(OpError::Unary {
                op: "-",
                operand: other.type_name(),
            }),
        }
    }

    pub fn logic_not(&self) -> Result<Value, OpError> {
        match self.truth() {
            Some(b) => Ok(truth(!b)),
            None => Err(OpError::Unary {
                op: "!",
                operand: self.type_name(),
            }),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Double(x)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        truth(b)
    }
}

impl From<HostValue> for Value {
    fn from(p: HostValue) -> Self {
        Value::Object(Some(p))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
