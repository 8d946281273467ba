//! Recursive-descent parser tying the binop engine, indexer algebra,
//! projections, and arg-function applier together.
//!
//! The mutually-recursive entry points below are free functions sharing
//! a `Cursor` over the token slice, not a class hierarchy — this keeps
//! every production a plain function callable from any other
//! production without an object to thread through.

use crate::dsl::binop::{self, BinopDef, Tree};
use crate::dsl::function;
use crate::dsl::indexer::{Indexer, IndexerStep, NameEntry, SliceEntry};
use crate::dsl::pipeline::Pipeline;
use crate::dsl::projection::Projection;
use crate::error::{Error, Result};
use crate::token::{Delimiter, Token};
use crate::value::{SliceSpec, TypeTag, Value};

/// A read-only cursor over a token slice, threaded through every parse
/// function instead of being owned by a parser object.
struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Cursor { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect_delim(&mut self, delim: Delimiter) -> Result<()> {
        match self.advance() {
            Some(Token::Delim(d)) if *d == delim => Ok(()),
            other => Err(Error::parse(format!("expected `{:?}`, found {:?}", delim, other))),
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }
}

/// Parses a full selector or mutator token stream into a single compiled
/// `Value`, rejecting any trailing tokens.
pub fn parse(tokens: &[Token]) -> Result<Value> {
    let mut cur = Cursor::new(tokens);
    let result = parse_expr_or_scalar_func(&mut cur)?;
    if !cur.at_end() {
        return Err(Error::parse("unexpected trailing tokens after expression"));
    }
    Ok(result)
}

/// Parses a mutator *selector* specifically: it must open with the
/// current-input sigil and consist of nothing but an indexer chain,
/// since a mutator selector addresses *positions* within the input
/// rather than computing an arbitrary derived value.
/// Returns the raw, unapplied steps for `dsl::mutator::MutatorSpec`.
pub fn parse_selector_steps(tokens: &[Token]) -> Result<Vec<IndexerStep>> {
    let mut cur = Cursor::new(tokens);
    match cur.advance() {
        Some(Token::CurrentInput) => {}
        other => return Err(Error::parse(format!("a mutator selector must start with `@`, found {:?}", other))),
    }
    let steps = parse_indexer_chain(&mut cur)?;
    if !cur.at_end() {
        return Err(Error::parse("unexpected trailing tokens after mutator selector"));
    }
    Ok(steps)
}

/// Top-level expression entry point. Fast-paths a bare
/// single-token atom directly followed by an expression terminator;
/// otherwise loops pulling `atom (binop atom)*`, tracking a leading
/// unary minus that either fuses into a `negpow` with an immediately
/// following `**`, or is applied to the whole resolved tree.
fn parse_expr_or_scalar_func(cur: &mut Cursor) -> Result<Value> {
    if let Some(Token::Delim(d)) = cur.peek_at(1) {
        if d.is_expr_terminator() {
            return parse_expr_or_scalar(cur);
        }
    }

    let mut negate = false;
    if let Some(Token::Binop(op)) = cur.peek() {
        if op.name == "-" {
            negate = true;
            cur.advance();
        }
    }

    let mut first = parse_expr_or_scalar(cur)?;
    let mut rest: Vec<(BinopDef, Value)> = Vec::new();
    let mut is_first_binop = true;

    while let Some(Token::Binop(op)) = cur.peek().cloned() {
        cur.advance();
        if negate && is_first_binop && op.name == "**" {
            let term = parse_expr_or_scalar(cur)?;
            let negpow = binop::lookup("negpow").expect("negpow is always registered");
            rest.push((negpow, term));
            negate = false;
        } else {
            if negate && is_first_binop {
                first = negate_value(first)?;
                negate = false;
            }
            let term = parse_expr_or_scalar(cur)?;
            rest.push((op, term));
        }
        is_first_binop = false;
    }

    if negate {
        first = negate_value(first)?;
    }

    Tree::build(first, rest).resolve()
}

/// Applies unary minus to a (possibly `Deferred`, possibly container)
/// value, vectorizing across containers and closing over `Deferred`
/// operands the same way binops do.
fn negate_value(v: Value) -> Result<Value> {
    match v {
        Value::Int(i) => Ok(Value::Int(-i)),
        Value::Float(f) => Ok(Value::Float(-f)),
        Value::Array(items) => Ok(Value::Array(
            items.into_iter().map(negate_value).collect::<Result<Vec<_>>>()?,
        )),
        Value::Object(map) => {
            let mut out = linked_hash_map::LinkedHashMap::with_capacity(map.len());
            for (k, val) in map {
                out.insert(k, negate_value(val)?);
            }
            Ok(Value::Object(out))
        }
        Value::Deferred(d) => Ok(Value::deferred(d.type_hint, move |input| negate_value(d.call(input)?))),
        other => Err(Error::type_error(format!("unary `-` is not defined for {}", other.type_tag()))),
    }
}

/// Parses one atom, then — if the atom is iterable or its type cannot be
/// determined statically (i.e. it's `Deferred`) — an indexer chain
/// following it, wrapping the whole thing in the indexer pipeline
///.
fn parse_expr_or_scalar(cur: &mut Cursor) -> Result<Value> {
    let atom = parse_atom(cur)?;
    if !atom.is_iterable() && !atom.is_deferred() {
        return Ok(atom);
    }

    let steps = parse_indexer_chain(cur)?;
    if steps.is_empty() {
        return Ok(atom);
    }

    let pipeline = Pipeline::new(steps);
    match atom {
        Value::Deferred(d) => Ok(Value::deferred(TypeTag::UNKNOWN, move |input| {
            let resolved = d.call(input)?;
            pipeline.apply(&resolved)
        })),
        other => pipeline.apply(&other),
    }
}

fn parse_atom(cur: &mut Cursor) -> Result<Value> {
    match cur.peek().cloned() {
        Some(Token::CurrentInput) => {
            cur.advance();
            Ok(Value::current_input())
        }
        Some(Token::Literal(v)) => {
            cur.advance();
            Ok(v)
        }
        Some(Token::Delim(Delimiter::LParen)) => {
            cur.advance();
            let inner = parse_expr_or_scalar_func(cur)?;
            cur.expect_delim(Delimiter::RParen)?;
            Ok(inner)
        }
        Some(Token::Ident(id)) => {
            cur.advance();
            if matches!(cur.peek(), Some(Token::Delim(Delimiter::LParen))) {
                parse_arg_function(cur, &id.value)
            } else {
                Err(Error::parse(format!("unexpected identifier `{}`", id.value)))
            }
        }
        other => Err(Error::parse(format!("unexpected token {:?}", other))),
    }
}

/// Parses zero or more consecutive indexers after an atom
/// (`.name`, `..name`, `[...]`, `{...}`, possibly repeated).
fn parse_indexer_chain(cur: &mut Cursor) -> Result<Vec<IndexerStep>> {
    let mut steps = Vec::new();
    loop {
        let starter = match cur.peek() {
            Some(Token::Delim(d)) if d.is_indexer_starter() => *d,
            _ => break,
        };

        match starter {
            Delimiter::Dot => {
                cur.advance();
                let mut recursive = false;
                if matches!(cur.peek(), Some(Token::Delim(Delimiter::Dot))) {
                    recursive = true;
                    cur.advance();
                }
                steps.push(parse_dotted_indexer(cur, recursive)?);
            }
            Delimiter::LBracket => {
                steps.push(parse_bracket_indexer(cur, false)?);
            }
            Delimiter::LBrace => {
                steps.push(parse_projection(cur)?);
            }
            _ => unreachable!("is_indexer_starter only accepts Dot, LBracket, LBrace"),
        }
    }
    Ok(steps)
}

/// Parses the indexer following a single `.` (or `..`): either a bare
/// name (`.foo`), a star (`.*`), or a bracketed list (`.[...]`, which
/// the grammar only reaches via `..[...]`  since a plain `.` is always
/// followed directly by a name or `*`).
fn parse_dotted_indexer(cur: &mut Cursor, recursive: bool) -> Result<IndexerStep> {
    match cur.peek().cloned() {
        Some(Token::Ident(id)) if id.value == "*" => {
            cur.advance();
            Ok(IndexerStep {
                indexer: Indexer::Star,
                has_one_option: false,
                is_projection: false,
                is_dict: false,
                is_recursive: recursive,
            })
        }
        Some(Token::Ident(id)) => {
            cur.advance();
            // A recursive `..name` may match any number of physically
            // distinct nodes (even for a single literal name), and those
            // matches can share a key, so the result can never collapse
            // to a single scalar or a key-unique Object the way a plain
            // `.name` step does.
            Ok(IndexerStep {
                indexer: Indexer::NameList(vec![NameEntry::Literal(id.value)]),
                has_one_option: !recursive,
                is_projection: false,
                is_dict: !recursive,
                is_recursive: recursive,
            })
        }
        Some(Token::Delim(Delimiter::LBracket)) => parse_bracket_indexer(cur, recursive),
        other => Err(Error::parse(format!("expected a name, `*`, or `[` after `.`, found {:?}", other))),
    }
}

/// Parses a `[...]` indexer body: a comma-separated list of entries that
/// must be homogeneous — all key-like (string
/// or regex literals, producing a `NameList`), all index-like (ints
/// and/or slices, producing a `SliceList`), a lone `*`, or a single
/// boolean expression.
fn parse_bracket_indexer(cur: &mut Cursor, recursive: bool) -> Result<IndexerStep> {
    cur.expect_delim(Delimiter::LBracket)?;

    if let Some(Token::Ident(id)) = cur.peek() {
        if id.value == "*" {
            cur.advance();
            cur.expect_delim(Delimiter::RBracket)?;
            return Ok(IndexerStep {
                indexer: Indexer::Star,
                has_one_option: false,
                is_projection: false,
                is_dict: false,
                is_recursive: recursive,
            });
        }
    }

    #[derive(PartialEq, Eq, Clone, Copy)]
    enum Kind {
        Name,
        Slice,
        Boolean,
    }

    impl std::fmt::Display for Kind {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(match self {
                Kind::Name => "a name list",
                Kind::Slice => "a slice list",
                Kind::Boolean => "a boolean index",
            })
        }
    }

    let mut kind: Option<Kind> = None;
    let mut name_entries = Vec::new();
    let mut slice_entries = Vec::new();
    let mut bool_value: Option<Value> = None;
    let mut entry_count = 0usize;

    loop {
        if matches!(cur.peek(), Some(Token::Delim(Delimiter::RBracket))) {
            break;
        }
        entry_count += 1;

        let incoming = match cur.peek() {
            Some(Token::Literal(Value::String(_))) | Some(Token::Literal(Value::Regex(_))) => Kind::Name,
            Some(Token::Literal(Value::Int(_))) | Some(Token::Delim(Delimiter::Colon)) => Kind::Slice,
            _ => Kind::Boolean,
        };
        if let Some(prev) = kind {
            if prev != incoming {
                return Err(Error::indexing(format!(
                    "an indexer's entries must all be the same kind: mixed {} with {}",
                    prev, incoming
                )));
            }
            if incoming == Kind::Boolean {
                return Err(Error::indexing("a boolean index may only contain a single expression"));
            }
        }
        kind = Some(incoming);

        match cur.peek().cloned() {
            Some(Token::Literal(Value::String(s))) => {
                cur.advance();
                name_entries.push(NameEntry::Literal(s));
            }
            Some(Token::Literal(Value::Regex(re))) => {
                cur.advance();
                name_entries.push(NameEntry::Pattern(re));
            }
            Some(Token::Literal(Value::Int(_))) | Some(Token::Delim(Delimiter::Colon)) => {
                slice_entries.push(parse_slicer_or_index(cur)?);
            }
            _ => {
                bool_value = Some(parse_expr_or_scalar_func(cur)?);
            }
        }

        match cur.peek() {
            Some(Token::Delim(Delimiter::Comma)) => {
                cur.advance();
            }
            Some(Token::Delim(Delimiter::RBracket)) => break,
            other => return Err(Error::parse(format!("expected `,` or `]` in indexer, found {:?}", other))),
        }
    }
    cur.expect_delim(Delimiter::RBracket)?;

    if entry_count == 0 {
        return Err(Error::parse("an indexer's `[...]` must not be empty"));
    }
    if recursive && !matches!(kind, Some(Kind::Name)) {
        return Err(Error::indexing("recursive search (`..`) is only defined for name lists and `*`"));
    }

    let (indexer, has_one_option, is_dict) = match kind.expect("entry_count > 0 implies a kind was set") {
        Kind::Name => {
            // A recursive `..[names]` can match any number of physically
            // distinct nodes under any one entry, so — unlike its
            // non-recursive counterpart — it is never `has_one_option`
            // and never dict-shaped.
            let has_one = !recursive && entry_count == 1 && matches!(name_entries.first(), Some(NameEntry::Literal(_)));
            (Indexer::NameList(name_entries), has_one, !recursive)
        }
        Kind::Slice => {
            let has_one = entry_count == 1 && matches!(slice_entries.first(), Some(SliceEntry::Index(_)));
            (Indexer::SliceList(slice_entries), has_one, false)
        }
        Kind::Boolean => (
            Indexer::Boolean(bool_value.expect("Boolean kind always records a value")),
            false,
            false,
        ),
    };

    Ok(IndexerStep { indexer, has_one_option, is_projection: false, is_dict, is_recursive: recursive })
}

/// Parses one index/slice entry: `int`, `:stop`, `start:`, `start:stop`,
/// `start:stop:step`, etc..
fn parse_slicer_or_index(cur: &mut Cursor) -> Result<SliceEntry> {
    let start = parse_optional_int(cur)?;

    if matches!(cur.peek(), Some(Token::Delim(Delimiter::Colon))) {
        cur.advance();
        let stop = parse_optional_int(cur)?;
        let mut step = None;
        if matches!(cur.peek(), Some(Token::Delim(Delimiter::Colon))) {
            cur.advance();
            step = parse_optional_int(cur)?;
        }
        Ok(SliceEntry::Range(SliceSpec { start, stop, step }))
    } else {
        match start {
            Some(i) => Ok(SliceEntry::Index(i)),
            None => Err(Error::parse("expected an integer or `:` in an index/slice entry")),
        }
    }
}

fn parse_optional_int(cur: &mut Cursor) -> Result<Option<i64>> {
    match cur.peek() {
        Some(Token::Literal(Value::Int(i))) => {
            let i = *i;
            cur.advance();
            Ok(Some(i))
        }
        _ => Ok(None),
    }
}

/// Parses `(arg, arg, …)` after a known function name, validating arity
/// and per-argument types against the registry entry, then dispatches
/// through [`function::apply`].
fn parse_arg_function(cur: &mut Cursor, name: &str) -> Result<Value> {
    let def = function::lookup(name).ok_or_else(|| Error::parse(format!("unknown function `{}`", name)))?;
    cur.expect_delim(Delimiter::LParen)?;

    let mut args = Vec::new();
    if !matches!(cur.peek(), Some(Token::Delim(Delimiter::RParen))) {
        loop {
            args.push(parse_arg(cur, &def, args.len())?);
            match cur.peek() {
                Some(Token::Delim(Delimiter::Comma)) => {
                    cur.advance();
                }
                Some(Token::Delim(Delimiter::RParen)) => break,
                other => return Err(Error::parse(format!("expected `,` or `)` in argument list, found {:?}", other))),
            }
        }
    }
    cur.expect_delim(Delimiter::RParen)?;

    if args.len() < def.min_args || def.max_args.map_or(false, |max| args.len() > max) {
        return Err(Error::parse(format!(
            "`{}` expects between {} and {} arguments, got {}",
            name,
            def.min_args,
            def.max_args.map_or_else(|| "unbounded".to_owned(), |m| m.to_string()),
            args.len()
        )));
    }

    function::apply(def, args)
}

fn parse_arg(cur: &mut Cursor, def: &function::FunctionDef, index: usize) -> Result<Value> {
    let value = parse_expr_or_scalar_func(cur)?;
    // `null` is always accepted without a type check: it's how an
    // optional trailing argument is explicitly skipped.
    if matches!(value, Value::Null) {
        return Ok(value);
    }
    let vt = value.type_tag();
    let mask = function::mask_for(def, index);
    if !vt.contains(TypeTag::UNKNOWN) && !mask.contains(TypeTag::UNKNOWN) && !vt.intersects(mask) {
        return Err(Error::parse(format!(
            "argument {} to `{}` must be of type {}, found {}",
            index + 1,
            def.name,
            mask,
            vt
        )));
    }
    Ok(value)
}

/// Parses `{expr, expr, …}` (array projection) or `{"k": expr, …}` /
/// `{k: expr, …}` (object projection); mixing keyed and bare entries is
/// rejected.
fn parse_projection(cur: &mut Cursor) -> Result<IndexerStep> {
    cur.expect_delim(Delimiter::LBrace)?;

    if matches!(cur.peek(), Some(Token::Delim(Delimiter::RBrace))) {
        cur.advance();
        return Ok(IndexerStep {
            indexer: Indexer::Projection(Projection::Array(Vec::new())),
            has_one_option: false,
            is_projection: true,
            is_dict: false,
            is_recursive: false,
        });
    }

    enum Kind {
        Array,
        Object,
    }

    let mut kind: Option<Kind> = None;
    let mut array_items = Vec::new();
    let mut object_items = Vec::new();

    loop {
        let is_keyed_entry = matches!(cur.peek(), Some(Token::Literal(Value::String(_))) | Some(Token::Ident(_)))
            && matches!(cur.peek_at(1), Some(Token::Delim(Delimiter::Colon)));

        if is_keyed_entry {
            match kind {
                None => kind = Some(Kind::Object),
                Some(Kind::Object) => {}
                Some(Kind::Array) => return Err(Error::parse("cannot mix keyed and bare entries in a projection")),
            }
            let key = match cur.advance().cloned() {
                Some(Token::Literal(Value::String(s))) => s,
                Some(Token::Ident(id)) => id.value,
                _ => unreachable!("is_keyed_entry only matches those two token shapes"),
            };
            cur.expect_delim(Delimiter::Colon)?;
            let expr = parse_expr_or_scalar_func(cur)?;
            object_items.push((key, expr));
        } else {
            match kind {
                None => kind = Some(Kind::Array),
                Some(Kind::Array) => {}
                Some(Kind::Object) => return Err(Error::parse("cannot mix keyed and bare entries in a projection")),
            }
            array_items.push(parse_expr_or_scalar_func(cur)?);
        }

        match cur.peek() {
            Some(Token::Delim(Delimiter::Comma)) => {
                cur.advance();
            }
            Some(Token::Delim(Delimiter::RBrace)) => break,
            other => return Err(Error::parse(format!("expected `,` or `}}` in projection, found {:?}", other))),
        }
    }
    cur.expect_delim(Delimiter::RBrace)?;

    let (projection, is_dict) = match kind {
        Some(Kind::Object) => (Projection::Object(object_items), true),
        Some(Kind::Array) | None => (Projection::Array(array_items), false),
    };

    Ok(IndexerStep { indexer: Indexer::Projection(projection), has_one_option: false, is_projection: true, is_dict, is_recursive: false })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::UnquotedString;
    use linked_hash_map::LinkedHashMap;

    fn ident(s: &str) -> Token {
        Token::Ident(UnquotedString { value: s.to_owned() })
    }

    fn obj(pairs: &[(&str, Value)]) -> Value {
        let mut m = LinkedHashMap::new();
        for (k, v) in pairs {
            m.insert((*k).to_owned(), v.clone());
        }
        Value::Object(m)
    }

    #[test]
    fn single_literal_fast_path() {
        // `5` with no trailing terminator context just round-trips.
        let tokens = vec![Token::Literal(Value::Int(5))];
        let result = parse(&tokens).unwrap();
        assert_eq!(result, Value::Int(5));
    }

    #[test]
    fn scenario_1_dot_index() {
        // @.a[1] on {"a":[1,2,3]} -> 2
        let tokens = vec![
            Token::CurrentInput,
            Token::Delim(Delimiter::Dot),
            ident("a"),
            Token::Delim(Delimiter::LBracket),
            Token::Literal(Value::Int(1)),
            Token::Delim(Delimiter::RBracket),
        ];
        let compiled = parse(&tokens).unwrap();
        let input = obj(&[("a", Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]))]);
        let result = match compiled {
            Value::Deferred(d) => d.call(&input).unwrap(),
            other => other,
        };
        assert_eq!(result, Value::Int(2));
    }

    #[test]
    fn scenario_2_vectorized_add() {
        // @.a + @.b on {"a":[1,2,3],"b":[10,20,30]} -> [11,22,33]
        let a_path = vec![Token::CurrentInput, Token::Delim(Delimiter::Dot), ident("a")];
        let b_path = vec![Token::CurrentInput, Token::Delim(Delimiter::Dot), ident("b")];
        let mut tokens = a_path;
        tokens.push(Token::Binop(binop::lookup("+").unwrap()));
        tokens.extend(b_path);

        let compiled = parse(&tokens).unwrap();
        let input = obj(&[
            ("a", Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)])),
            ("b", Value::Array(vec![Value::Int(10), Value::Int(20), Value::Int(30)])),
        ]);
        let result = match compiled {
            Value::Deferred(d) => d.call(&input).unwrap(),
            other => other,
        };
        assert_eq!(
            result,
            Value::Array(vec![Value::Int(11), Value::Int(22), Value::Int(33)])
        );
    }

    #[test]
    fn scenario_3_boolean_filter() {
        // @[@ > 2] on [1,2,3,4] -> [3,4]
        let tokens = vec![
            Token::CurrentInput,
            Token::Delim(Delimiter::LBracket),
            Token::CurrentInput,
            Token::Binop(binop::lookup(">").unwrap()),
            Token::Literal(Value::Int(2)),
            Token::Delim(Delimiter::RBracket),
        ];
        let compiled = parse(&tokens).unwrap();
        let input = Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)]);
        let result = match compiled {
            Value::Deferred(d) => d.call(&input).unwrap(),
            other => other,
        };
        assert_eq!(result, Value::Array(vec![Value::Int(3), Value::Int(4)]));
    }

    #[test]
    fn scenario_6_unary_minus_fuses_with_pow() {
        // -@ ** 2 on [1,2,3] -> [-1,-4,-9]
        let tokens = vec![
            Token::Binop(binop::lookup("-").unwrap()),
            Token::CurrentInput,
            Token::Binop(binop::lookup("**").unwrap()),
            Token::Literal(Value::Int(2)),
        ];
        let compiled = parse(&tokens).unwrap();
        let input = Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let result = match compiled {
            Value::Deferred(d) => d.call(&input).unwrap(),
            other => other,
        };
        assert_eq!(
            result,
            Value::Array(vec![Value::Float(-1.0), Value::Float(-4.0), Value::Float(-9.0)])
        );
    }

    #[test]
    fn scenario_4_recursive_namelist_is_array_shaped() {
        // {"x":{"y":{"z":5}}} · @..z -> [5], an array, not {"z": 5}
        let tokens = vec![
            Token::CurrentInput,
            Token::Delim(Delimiter::Dot),
            Token::Delim(Delimiter::Dot),
            ident("z"),
        ];
        let compiled = parse(&tokens).unwrap();
        let input = obj(&[("x", obj(&[("y", obj(&[("z", Value::Int(5))]))]))]);
        let result = match compiled {
            Value::Deferred(d) => d.call(&input).unwrap(),
            other => other,
        };
        assert_eq!(result, Value::Array(vec![Value::Int(5)]));
    }

    #[test]
    fn mixed_indexer_kinds_reject_at_parse_time() {
        // [ "a", 0 ] mixes a name-like and an index-like entry.
        let tokens = vec![
            Token::Delim(Delimiter::LBracket),
            Token::Literal(Value::from("a")),
            Token::Delim(Delimiter::Comma),
            Token::Literal(Value::Int(0)),
            Token::Delim(Delimiter::RBracket),
        ];
        let mut cur = Cursor::new(&tokens);
        let err = parse_bracket_indexer(&mut cur, false).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Indexing);
    }

    #[test]
    fn recursive_slice_list_rejected_at_parse_time() {
        let tokens = vec![
            Token::Delim(Delimiter::Dot),
            Token::Delim(Delimiter::Dot),
            Token::Delim(Delimiter::LBracket),
            Token::Literal(Value::Int(0)),
            Token::Delim(Delimiter::RBracket),
        ];
        let mut cur = Cursor::new(&tokens);
        cur.advance();
        cur.advance();
        let err = parse_dotted_indexer(&mut cur, true).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Indexing);
    }

    #[test]
    fn unknown_function_is_a_parse_error() {
        let tokens = vec![ident("nope"), Token::Delim(Delimiter::LParen), Token::Delim(Delimiter::RParen)];
        let err = parse(&tokens).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Parse);
    }

    #[test]
    fn arity_error_names_min_and_max() {
        // len() with zero arguments; len requires exactly one.
        let tokens = vec![ident("len"), Token::Delim(Delimiter::LParen), Token::Delim(Delimiter::RParen)];
        let err = parse(&tokens).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Parse);
    }

    #[test]
    fn object_projection_parses_and_resolves() {
        // @{a: @.a, b: @.b} on {"a":1,"b":2} -> {"a":1,"b":2}
        let tokens = vec![
            Token::CurrentInput,
            Token::Delim(Delimiter::LBrace),
            ident("a"),
            Token::Delim(Delimiter::Colon),
            Token::CurrentInput,
            Token::Delim(Delimiter::Dot),
            ident("a"),
            Token::Delim(Delimiter::Comma),
            ident("b"),
            Token::Delim(Delimiter::Colon),
            Token::CurrentInput,
            Token::Delim(Delimiter::Dot),
            ident("b"),
            Token::Delim(Delimiter::RBrace),
        ];
        let compiled = parse(&tokens).unwrap();
        let input = obj(&[("a", Value::Int(1)), ("b", Value::Int(2))]);
        let result = match compiled {
            Value::Deferred(d) => d.call(&input).unwrap(),
            other => other,
        };
        assert_eq!(result, obj(&[("a", Value::Int(1)), ("b", Value::Int(2))]));
    }
}
