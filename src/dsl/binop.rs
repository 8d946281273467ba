//! Binary operators: output-type inference, vectorization, and the
//! precedence-climbing tree builder.
//!
//! The operator table is a flat list of named operators rather than a
//! class hierarchy, keyed by [`BinopDef::name`] instead of by enum
//! variant, since each [`crate::token::Token::Binop`] carries its
//! descriptor by value.

use linked_hash_map::LinkedHashMap;

use crate::error::{Error, Result};
use crate::value::{TypeTag, Value};

/// A binary operator: its source-level name, its base precedence for
/// the tree builder, and the scalar-only function that implements it.
///
/// `apply` is never called with a container or a `Deferred` operand —
/// [`eval`] strips both away (vectorizing containers element-wise,
/// re-wrapping `Deferred` operands as a single composite `Deferred`)
/// before ever reaching a concrete `BinopDef::apply` call.
#[derive(Clone, Copy)]
pub struct BinopDef {
    /// The operator's source spelling, e.g. `"+"`, `"=="`, `"**"`.
    pub name: &'static str,
    /// Base precedence used by the tree builder.
    /// Higher binds tighter.
    pub precedence: f64,
    /// The scalar implementation. Operands are guaranteed non-container,
    /// non-`Deferred`, and already validated by [`out_type`].
    pub apply: fn(&Value, &Value) -> Result<Value>,
}

impl std::fmt::Debug for BinopDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinopDef")
            .field("name", &self.name)
            .field("precedence", &self.precedence)
            .finish()
    }
}

/// Looks up a binary operator by its source spelling.
pub fn lookup(name: &str) -> Option<BinopDef> {
    REGISTRY.iter().copied().find(|op| op.name == name)
}

/// The six comparison operators; these always produce `BOOL` (subject to
/// the container-propagation rule running first — see [`out_type`]).
fn is_comparison(name: &str) -> bool {
    matches!(name, "==" | "!=" | "<" | "<=" | ">" | ">=")
}

fn as_f64(v: &Value) -> f64 {
    match v {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        _ => unreachable!("as_f64 called on a non-numeric scalar"),
    }
}

fn both_int(l: &Value, r: &Value) -> Option<(i64, i64)> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => Some((*a, *b)),
        _ => None,
    }
}

pub(crate) fn cmp_scalars(l: &Value, r: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => as_f64(l).partial_cmp(&as_f64(r)).unwrap_or(Ordering::Equal),
    }
}

fn apply_add(l: &Value, r: &Value) -> Result<Value> {
    if let (Value::String(a), Value::String(b)) = (l, r) {
        return Ok(Value::String(a.clone() + b));
    }
    if let Some((a, b)) = both_int(l, r) {
        return Ok(Value::Int(a + b));
    }
    Ok(Value::Float(as_f64(l) + as_f64(r)))
}

fn apply_sub(l: &Value, r: &Value) -> Result<Value> {
    if let Some((a, b)) = both_int(l, r) {
        return Ok(Value::Int(a - b));
    }
    Ok(Value::Float(as_f64(l) - as_f64(r)))
}

fn apply_mul(l: &Value, r: &Value) -> Result<Value> {
    if let Some((a, b)) = both_int(l, r) {
        return Ok(Value::Int(a * b));
    }
    Ok(Value::Float(as_f64(l) * as_f64(r)))
}

fn apply_div(l: &Value, r: &Value) -> Result<Value> {
    Ok(Value::Float(as_f64(l) / as_f64(r)))
}

fn apply_mod(l: &Value, r: &Value) -> Result<Value> {
    if let Some((a, b)) = both_int(l, r) {
        if b == 0 {
            return Err(Error::type_error("modulo by zero"));
        }
        return Ok(Value::Int(a.rem_euclid(b)));
    }
    Ok(Value::Float(as_f64(l).rem_euclid(as_f64(r))))
}

fn apply_floordiv(l: &Value, r: &Value) -> Result<Value> {
    if let Some((a, b)) = both_int(l, r) {
        if b == 0 {
            return Err(Error::type_error("floor-division by zero"));
        }
        return Ok(Value::Int(a.div_euclid(b)));
    }
    Ok(Value::Int(as_f64(l).div_euclid(as_f64(r)) as i64))
}

fn apply_pow(l: &Value, r: &Value) -> Result<Value> {
    Ok(Value::Float(as_f64(l).powf(as_f64(r))))
}

fn apply_negpow(l: &Value, r: &Value) -> Result<Value> {
    Ok(Value::Float(-as_f64(l).powf(as_f64(r))))
}

fn apply_eq(l: &Value, r: &Value) -> Result<Value> {
    Ok(Value::Bool(l == r))
}

fn apply_ne(l: &Value, r: &Value) -> Result<Value> {
    Ok(Value::Bool(l != r))
}

fn apply_lt(l: &Value, r: &Value) -> Result<Value> {
    Ok(Value::Bool(cmp_scalars(l, r).is_lt()))
}

fn apply_le(l: &Value, r: &Value) -> Result<Value> {
    Ok(Value::Bool(cmp_scalars(l, r).is_le()))
}

fn apply_gt(l: &Value, r: &Value) -> Result<Value> {
    Ok(Value::Bool(cmp_scalars(l, r).is_gt()))
}

fn apply_ge(l: &Value, r: &Value) -> Result<Value> {
    Ok(Value::Bool(cmp_scalars(l, r).is_ge()))
}

fn apply_band(l: &Value, r: &Value) -> Result<Value> {
    match (l, r) {
        (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a && *b)),
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a & b)),
        _ => Err(Error::type_error("`&` requires both operands to be int or both bool")),
    }
}

fn apply_bor(l: &Value, r: &Value) -> Result<Value> {
    match (l, r) {
        (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a || *b)),
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a | b)),
        _ => Err(Error::type_error("`|` requires both operands to be int or both bool")),
    }
}

fn apply_bxor(l: &Value, r: &Value) -> Result<Value> {
    match (l, r) {
        (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a != *b)),
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a ^ b)),
        _ => Err(Error::type_error("`^` requires both operands to be int or both bool")),
    }
}

/// The full operator table, ordered by ascending base precedence
/// (comparisons loosest, `**` tightest). `negpow` is never produced by
/// the lexer; the parser synthesizes it when fusing a unary minus into
/// a following `**`.
const REGISTRY: &[BinopDef] = &[
    BinopDef { name: "==", precedence: 1.0, apply: apply_eq },
    BinopDef { name: "!=", precedence: 1.0, apply: apply_ne },
    BinopDef { name: "<", precedence: 1.0, apply: apply_lt },
    BinopDef { name: "<=", precedence: 1.0, apply: apply_le },
    BinopDef { name: ">", precedence: 1.0, apply: apply_gt },
    BinopDef { name: ">=", precedence: 1.0, apply: apply_ge },
    BinopDef { name: "&", precedence: 2.0, apply: apply_band },
    BinopDef { name: "|", precedence: 2.0, apply: apply_bor },
    BinopDef { name: "^", precedence: 2.0, apply: apply_bxor },
    BinopDef { name: "+", precedence: 3.0, apply: apply_add },
    BinopDef { name: "-", precedence: 3.0, apply: apply_sub },
    BinopDef { name: "*", precedence: 4.0, apply: apply_mul },
    BinopDef { name: "/", precedence: 4.0, apply: apply_div },
    BinopDef { name: "%", precedence: 4.0, apply: apply_mod },
    BinopDef { name: "//", precedence: 4.0, apply: apply_floordiv },
    BinopDef { name: "**", precedence: 5.0, apply: apply_pow },
    BinopDef { name: "negpow", precedence: 5.0, apply: apply_negpow },
];

/// Infers the static output type of `op` applied to operands of types
/// `t1` and `t2`, in priority order:
///
/// 1. either operand `UNKNOWN` → `UNKNOWN`;
/// 2. either operand a container → propagate that container's tag
///    (mixing `OBJ` and `ARR` is an error);
/// 3. comparisons → `BOOL`;
/// 4. string concatenation (`+` with a `STR` operand) → `STR`, and
///    requires both operands to be strings;
/// 5. bitwise/logical `&|^` → `INT` (both int) or `BOOL` (both bool);
/// 6. arithmetic fallback → `INT` for `//`, `FLOAT` for `/` and `**`,
///    otherwise `INT` if both operands are `INT`, else `FLOAT`.
pub fn out_type(op_name: &str, t1: TypeTag, t2: TypeTag) -> Result<TypeTag> {
    if t1.contains(TypeTag::UNKNOWN) || t2.contains(TypeTag::UNKNOWN) {
        return Ok(TypeTag::UNKNOWN);
    }

    let t1_container = t1.intersects(TypeTag::ITERABLE);
    let t2_container = t2.intersects(TypeTag::ITERABLE);
    if t1_container || t2_container {
        return match (t1_container, t2_container) {
            (true, true) if t1 != t2 => Err(Error::type_error(format!(
                "cannot mix object and array operands of `{}`",
                op_name
            ))),
            (true, _) => Ok(t1),
            (false, true) => Ok(t2),
            (false, false) => unreachable!(),
        };
    }

    if is_comparison(op_name) {
        return Ok(TypeTag::BOOL);
    }

    if op_name == "+" && (t1.contains(TypeTag::STR) || t2.contains(TypeTag::STR)) {
        return if t1.contains(TypeTag::STR) && t2.contains(TypeTag::STR) {
            Ok(TypeTag::STR)
        } else {
            Err(Error::type_error("string concatenation requires both operands to be strings"))
        };
    }

    if matches!(op_name, "&" | "|" | "^") {
        return if t1.contains(TypeTag::INT) && t2.contains(TypeTag::INT) {
            Ok(TypeTag::INT)
        } else if t1.contains(TypeTag::BOOL) && t2.contains(TypeTag::BOOL) {
            Ok(TypeTag::BOOL)
        } else {
            Err(Error::type_error(format!(
                "`{}` requires both operands to be int or both bool",
                op_name
            )))
        };
    }

    if t1.contains(TypeTag::BOOL) && t2.contains(TypeTag::BOOL) {
        return Err(Error::type_error(format!("arithmetic `{}` is not defined for two bools", op_name)));
    }

    if op_name == "//" {
        return Ok(TypeTag::INT);
    }
    if matches!(op_name, "/" | "**" | "negpow") {
        return Ok(TypeTag::FLOAT);
    }
    if t1.contains(TypeTag::INT) && t2.contains(TypeTag::INT) {
        Ok(TypeTag::INT)
    } else {
        Ok(TypeTag::FLOAT)
    }
}

/// Resolves a (possibly `Deferred`) operand against a concrete input,
/// leaving already-concrete values untouched.
fn resolve_against(v: &Value, input: &Value) -> Result<Value> {
    match v {
        Value::Deferred(d) => d.call(input),
        other => Ok(other.clone()),
    }
}

/// Applies `op` to `l` and `r`, handling `Deferred` propagation and
/// container vectorization. This is the single entry
/// point every caller — the tree builder, the indexer's `Boolean`
/// variant, arg-functions with `is_vectorized` set — should use instead
/// of calling `BinopDef::apply` directly.
pub fn eval(op: BinopDef, l: Value, r: Value) -> Result<Value> {
    if l.is_deferred() || r.is_deferred() {
        let hint = out_type(op.name, l.type_tag(), r.type_tag()).unwrap_or(TypeTag::UNKNOWN);
        return Ok(Value::deferred(hint, move |input| {
            let lv = resolve_against(&l, input)?;
            let rv = resolve_against(&r, input)?;
            eval(op, lv, rv)
        }));
    }

    match (&l, &r) {
        (Value::Array(_), _) | (_, Value::Array(_)) | (Value::Object(_), _) | (_, Value::Object(_)) => {
            vectorize(op, l, r)
        }
        _ => apply_scalar(op, l, r),
    }
}

fn apply_scalar(op: BinopDef, l: Value, r: Value) -> Result<Value> {
    out_type(op.name, l.type_tag(), r.type_tag())?;
    (op.apply)(&l, &r)
}

/// Lifts `op` element-wise across one or two container operands:
/// array∘array and object∘object require matching length or key set
/// respectively; array∘scalar and object∘scalar broadcast the scalar
/// across every element.
fn vectorize(op: BinopDef, l: Value, r: Value) -> Result<Value> {
    match (l, r) {
        (Value::Array(a), Value::Array(b)) => {
            if a.len() != b.len() {
                return Err(Error::vectorized_arithmetic(format!(
                    "array operands of `{}` have different lengths ({} vs {})",
                    op.name,
                    a.len(),
                    b.len()
                )));
            }
            let items = a.into_iter().zip(b).map(|(x, y)| eval(op, x, y)).collect::<Result<Vec<_>>>()?;
            Ok(Value::Array(items))
        }
        (Value::Object(a), Value::Object(b)) => {
            if a.len() != b.len() || !a.keys().all(|k| b.contains_key(k)) {
                return Err(Error::vectorized_arithmetic(format!(
                    "object operands of `{}` have mismatched key sets",
                    op.name
                )));
            }
            let mut out = LinkedHashMap::with_capacity(a.len());
            for (k, av) in a.into_iter() {
                let bv = b.get(&k).cloned().expect("key checked above");
                out.insert(k, eval(op, av, bv)?);
            }
            Ok(Value::Object(out))
        }
        (Value::Array(a), scalar) => {
            let items = a.into_iter().map(|x| eval(op, x, scalar.clone())).collect::<Result<Vec<_>>>()?;
            Ok(Value::Array(items))
        }
        (scalar, Value::Array(b)) => {
            let items = b.into_iter().map(|y| eval(op, scalar.clone(), y)).collect::<Result<Vec<_>>>()?;
            Ok(Value::Array(items))
        }
        (Value::Object(a), scalar) => {
            let mut out = LinkedHashMap::with_capacity(a.len());
            for (k, v) in a.into_iter() {
                out.insert(k, eval(op, v, scalar.clone())?);
            }
            Ok(Value::Object(out))
        }
        (scalar, Value::Object(b)) => {
            let mut out = LinkedHashMap::with_capacity(b.len());
            for (k, v) in b.into_iter() {
                out.insert(k, eval(op, scalar.clone(), v)?);
            }
            Ok(Value::Object(out))
        }
        _ => unreachable!("vectorize called without a container operand"),
    }
}

/// One node of a [`Tree`]: either a leaf value (a literal or a compiled
/// sub-expression), or a binop whose right child fills in as the tree
/// builder advances.
#[derive(Debug)]
enum Node {
    Leaf(Value),
    Binop { op: BinopDef, left: usize, right: Option<usize> },
}

/// A binop expression tree built by precedence climbing. Stored as an
/// arena of [`Node`]s addressed by index rather than boxed pointers, so
/// the builder can mutate a "current rightmost slot" in place while it
/// walks the flat operand/operator sequence.
#[derive(Debug)]
pub struct Tree {
    arena: Vec<Node>,
    root: usize,
}

fn effective_precedence(op: &BinopDef) -> f64 {
    if op.name == "**" || op.name == "negpow" {
        op.precedence + 0.1
    } else {
        op.precedence
    }
}

impl Tree {
    /// A tree with no operators at all: a single value.
    pub fn leaf(value: Value) -> Self {
        Tree { arena: vec![Node::Leaf(value)], root: 0 }
    }

    /// Builds a tree from a flattened `operand (op operand)*` sequence
    /// using precedence climbing: each new operator either extends the
    /// current pending binop (if it binds tighter than the previous one)
    /// or closes it off and becomes the new root (if it binds the same
    /// or looser). `**`/`negpow` bump their own effective precedence by
    /// `0.1` for the duration of the climb, making the operator
    /// right-associative.
    pub fn build(first: Value, rest: Vec<(BinopDef, Value)>) -> Self {
        let mut arena = vec![Node::Leaf(first)];
        let mut left_operand = 0usize;
        let mut root: Option<usize> = None;
        let mut leaf: Option<usize> = None;
        let mut p_prev = f64::NEG_INFINITY;

        for (op, term) in rest {
            let p_op = effective_precedence(&op);

            // `p_prev` holds the *raw* precedence of the previous operator,
            // not its bumped one: bumping only the incoming side of the
            // comparison is what makes `**`/`negpow` right-associative
            // while every other (left-associative) operator's comparison
            // is unaffected (raw == effective for them).
            if p_prev >= p_op {
                if let Some(leaf_idx) = leaf {
                    Self::set_right(&mut arena, leaf_idx, left_operand);
                }
                let new_idx = arena.len();
                arena.push(Node::Binop { op, left: root.expect("leaf implies root"), right: None });
                root = Some(new_idx);
                leaf = Some(new_idx);
            } else {
                let new_idx = arena.len();
                arena.push(Node::Binop { op, left: left_operand, right: None });
                match root {
                    None => {
                        root = Some(new_idx);
                        leaf = Some(new_idx);
                    }
                    Some(_) => {
                        let leaf_idx = leaf.expect("root implies leaf");
                        Self::set_right(&mut arena, leaf_idx, new_idx);
                        leaf = Some(new_idx);
                    }
                }
            }

            left_operand = arena.len();
            arena.push(Node::Leaf(term));
            p_prev = op.precedence;
        }

        if let Some(leaf_idx) = leaf {
            Self::set_right(&mut arena, leaf_idx, left_operand);
        }

        let root = root.unwrap_or(left_operand);
        Tree { arena, root }
    }

    fn set_right(arena: &mut [Node], node_idx: usize, right_idx: usize) {
        match &mut arena[node_idx] {
            Node::Binop { right, .. } => *right = Some(right_idx),
            Node::Leaf(_) => unreachable!("leaf index does not point to a Binop node"),
        }
    }

    /// Resolves the tree to a single `Value`, recursively descending
    /// both sides of every node and combining them with [`eval`]. The
    /// result is itself `Deferred` if any leaf along the way was.
    pub fn resolve(&self) -> Result<Value> {
        self.resolve_node(self.root)
    }

    fn resolve_node(&self, idx: usize) -> Result<Value> {
        match &self.arena[idx] {
            Node::Leaf(v) => Ok(v.clone()),
            Node::Binop { op, left, right } => {
                let l = self.resolve_node(*left)?;
                let r = self.resolve_node(right.expect("tree fully built"))?;
                eval(*op, l, r)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_type_container_propagates_over_comparison() {
        let t = out_type("==", TypeTag::ARR, TypeTag::INT).unwrap();
        assert_eq!(t, TypeTag::ARR);
    }

    #[test]
    fn out_type_rejects_mixed_containers() {
        let err = out_type("+", TypeTag::ARR, TypeTag::OBJ).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Type);
    }

    #[test]
    fn out_type_int_arithmetic() {
        assert_eq!(out_type("+", TypeTag::INT, TypeTag::INT).unwrap(), TypeTag::INT);
        assert_eq!(out_type("/", TypeTag::INT, TypeTag::INT).unwrap(), TypeTag::FLOAT);
        assert_eq!(out_type("//", TypeTag::FLOAT, TypeTag::INT).unwrap(), TypeTag::INT);
    }

    #[test]
    fn eval_scalar_arithmetic() {
        let plus = lookup("+").unwrap();
        let result = eval(plus, Value::Int(2), Value::Int(3)).unwrap();
        assert_eq!(result, Value::Int(5));
    }

    #[test]
    fn eval_string_concat() {
        let plus = lookup("+").unwrap();
        let result = eval(plus, Value::from("foo"), Value::from("bar")).unwrap();
        assert_eq!(result, Value::from("foobar"));
    }

    #[test]
    fn eval_vectorizes_array_over_scalar() {
        let mul = lookup("*").unwrap();
        let arr = Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let result = eval(mul, arr, Value::Int(10)).unwrap();
        assert_eq!(result, Value::Array(vec![Value::Int(10), Value::Int(20), Value::Int(30)]));
    }

    #[test]
    fn eval_array_array_length_mismatch_errors() {
        let plus = lookup("+").unwrap();
        let a = Value::Array(vec![Value::Int(1)]);
        let b = Value::Array(vec![Value::Int(1), Value::Int(2)]);
        let err = eval(plus, a, b).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::VectorizedArithmetic);
    }

    #[test]
    fn eval_propagates_deferred_operands() {
        let plus = lookup("+").unwrap();
        let current = Value::current_input();
        let result = eval(plus, current, Value::Int(1)).unwrap();
        assert!(result.is_deferred());
        match result {
            Value::Deferred(d) => assert_eq!(d.call(&Value::Int(41)).unwrap(), Value::Int(42)),
            _ => unreachable!(),
        }
    }

    #[test]
    fn tree_precedence_climbing_respects_mul_over_add() {
        // 2 + 3 * 4  ==  2 + (3 * 4)  ==  14
        let tree = Tree::build(
            Value::Int(2),
            vec![(lookup("+").unwrap(), Value::Int(3)), (lookup("*").unwrap(), Value::Int(4))],
        );
        assert_eq!(tree.resolve().unwrap(), Value::Int(14));
    }

    #[test]
    fn tree_left_associative_same_precedence() {
        // 10 - 3 - 2  ==  (10 - 3) - 2  ==  5
        let tree = Tree::build(
            Value::Int(10),
            vec![(lookup("-").unwrap(), Value::Int(3)), (lookup("-").unwrap(), Value::Int(2))],
        );
        assert_eq!(tree.resolve().unwrap(), Value::Int(5));
    }

    #[test]
    fn tree_pow_is_right_associative() {
        // 2 ** 3 ** 2  ==  2 ** (3 ** 2)  ==  2 ** 9  ==  512
        let tree = Tree::build(
            Value::Int(2),
            vec![(lookup("**").unwrap(), Value::Int(3)), (lookup("**").unwrap(), Value::Int(2))],
        );
        assert_eq!(tree.resolve().unwrap(), Value::Float(512.0));
    }

    #[test]
    fn tree_single_leaf_no_operators() {
        let tree = Tree::leaf(Value::Int(7));
        assert_eq!(tree.resolve().unwrap(), Value::Int(7));
    }
}
