//! Tree-walking evaluator.
//!
//! Every run owns a fresh global scope and borrows its output sink, so nothing
//! a program does survives past the call that ran it. Containers and captured
//! scopes are registered with a per-run [`heap::Heap`] that empties them when
//! the run ends.

pub mod builtins;
mod heap;
mod scope;

use std::fmt;
use std::rc::Rc;
use std::time::Instant;

use crate::ExecutionBudget;
use crate::ast::{
    BinaryOp, DeclKind, Expr, FunctionBody, FunctionDef, LogicalOp, PropKey, Stmt, SwitchCase,
    UnaryOp,
};
use crate::error::ExecutionError;
use crate::sink::OutputSink;
use crate::value::{
    ArrayRef, JsObject, MAX_ARRAY_LEN, MAX_STRING_LEN, Value, loose_equals, strict_equals,
};

use heap::{Heap, SCOPE_BYTES, SLOT_BYTES, STRING_HEADER_BYTES};
use scope::{AssignError, Lookup, Scope, ScopeRef};

/// A user-defined function value together with the scope it closed over.
pub struct Closure {
    def: Rc<FunctionDef>,
    env: ScopeRef,
}

impl Closure {
    #[must_use]
    pub fn name(&self) -> &str {
        self.def.name.as_deref().unwrap_or("")
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

pub(crate) enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// Non-local exits. `Throw` can be caught by the program; `Halt` cannot.
pub(crate) enum Abort {
    Throw(Value),
    Halt(ExecutionError),
}

impl From<ExecutionError> for Abort {
    fn from(err: ExecutionError) -> Self {
        Abort::Halt(err)
    }
}

pub(crate) type Eval<T> = Result<T, Abort>;

/// Raise a fresh error object of the given constructor name.
pub(crate) fn throw<T>(name: &str, message: impl Into<String>) -> Eval<T> {
    Err(Abort::Throw(Value::error(name, message)))
}

/// Append `piece` unless the result would pass the longest allowed string.
pub(crate) fn push_text(out: &mut String, piece: &str) -> Eval<()> {
    if out.len().saturating_add(piece.len()) > MAX_STRING_LEN {
        return throw("RangeError", "Invalid string length");
    }
    out.push_str(piece);
    Ok(())
}

enum Reference {
    Binding(String),
    Property(Value, String),
}

pub(crate) struct Interpreter<'a> {
    sink: &'a mut dyn OutputSink,
    budget: ExecutionBudget,
    started: Instant,
    steps: u64,
    depth: usize,
    heap: Heap,
    globals: ScopeRef,
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(sink: &'a mut dyn OutputSink, budget: ExecutionBudget) -> Self {
        let mut heap = Heap::new(budget.max_alloc_bytes);
        let globals = Scope::root();
        builtins::install_globals(&mut globals.borrow_mut());
        heap.adopt_scope(&globals);
        Self {
            sink,
            budget,
            started: Instant::now(),
            steps: 0,
            depth: 0,
            heap,
            globals,
        }
    }

    pub(crate) fn steps(&self) -> u64 {
        self.steps
    }

    /// Execute a parsed program to completion or to its first uncaught fault,
    /// then release everything it allocated.
    pub(crate) fn run(&mut self, program: &[Stmt]) -> Result<(), ExecutionError> {
        let result = self.evaluate(program);
        self.heap.release();
        result
    }

    fn evaluate(&mut self, program: &[Stmt]) -> Result<(), ExecutionError> {
        let script = Scope::child(&self.globals);
        self.heap.adopt_scope(&script);
        let result = self.run_body(program, &script);
        match result {
            Ok(_) => Ok(()),
            Err(Abort::Halt(err)) => Err(err),
            Err(Abort::Throw(value)) => Err(uncaught(&value)),
        }
    }

    pub(crate) fn write_line(&mut self, line: &str) -> Eval<()> {
        self.sink.write_line(line)?;
        Ok(())
    }

    fn tick(&mut self) -> Eval<()> {
        self.steps += 1;
        if self.steps > self.budget.max_steps {
            return Err(Abort::Halt(ExecutionError::StepLimit {
                limit: self.budget.max_steps,
            }));
        }
        if self.steps % 256 == 0 && self.started.elapsed() > self.budget.timeout {
            let limit_ms = u64::try_from(self.budget.timeout.as_millis()).unwrap_or(u64::MAX);
            return Err(Abort::Halt(ExecutionError::TimedOut { limit_ms }));
        }
        Ok(())
    }

    // ─── allocation ───────────────────────────────────────────────────────────

    pub(crate) fn charge(&mut self, bytes: usize) -> Eval<()> {
        self.heap.charge(bytes)?;
        Ok(())
    }

    /// Check and pay for an array of `slots` entries before building it.
    pub(crate) fn reserve_slots(&mut self, slots: usize) -> Eval<()> {
        if slots > MAX_ARRAY_LEN {
            return throw("RangeError", "Invalid array length");
        }
        self.heap.charge_slots(slots)?;
        Ok(())
    }

    pub(crate) fn new_array(&mut self, items: Vec<Value>) -> Eval<Value> {
        self.reserve_slots(items.len())?;
        Ok(self.keep_array(items))
    }

    /// Wrap entries whose slots were already reserved.
    pub(crate) fn keep_array(&mut self, items: Vec<Value>) -> Value {
        let value = Value::array(items);
        self.heap.adopt(&value);
        value
    }

    /// Pay for `extra` more entries in an existing array.
    pub(crate) fn grow_array(&mut self, items: &ArrayRef, extra: usize) -> Eval<()> {
        self.heap.adopt_array(items);
        if items.borrow().len().saturating_add(extra) > MAX_ARRAY_LEN {
            return throw("RangeError", "Invalid array length");
        }
        self.heap.charge(extra.saturating_mul(SLOT_BYTES))?;
        Ok(())
    }

    pub(crate) fn new_object(&mut self, object: JsObject) -> Eval<Value> {
        let keys: usize = object.props.iter().map(|(key, _)| key.len()).sum();
        self.heap.charge_slots(object.props.len())?;
        self.heap.charge(keys)?;
        Ok(self.keep_object(object))
    }

    /// Wrap an object whose size was already paid for.
    pub(crate) fn keep_object(&mut self, object: JsObject) -> Value {
        let value = Value::object(object);
        self.heap.adopt(&value);
        value
    }

    pub(crate) fn new_string(&mut self, text: String) -> Eval<Value> {
        if text.len() > MAX_STRING_LEN {
            return throw("RangeError", "Invalid string length");
        }
        self.heap
            .charge(text.len().saturating_add(STRING_HEADER_BYTES))?;
        Ok(Value::from(text))
    }

    /// Keep a scope a closure is about to capture until the run ends.
    fn capture(&mut self, scope: &ScopeRef) -> Eval<()> {
        if self.heap.adopt_scope(scope) {
            self.heap.charge(SCOPE_BYTES)?;
        }
        Ok(())
    }

    // ─── statements ───────────────────────────────────────────────────────────

    /// Function or script body: hoists `var` and function declarations first.
    fn run_body(&mut self, body: &[Stmt], scope: &ScopeRef) -> Eval<Flow> {
        hoist_vars(body, &mut scope.borrow_mut());
        self.declare_block(body, scope)?;
        for stmt in body {
            match self.exec(stmt, scope)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_block(&mut self, body: &[Stmt], scope: &ScopeRef) -> Eval<Flow> {
        let inner = Scope::child(scope);
        self.declare_block(body, &inner)?;
        for stmt in body {
            match self.exec(stmt, &inner)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt, scope: &ScopeRef) -> Eval<Flow> {
        self.tick()?;
        match stmt {
            Stmt::Decl { kind, decls } => {
                for (name, init) in decls {
                    self.declare(*kind, name, init.as_ref(), scope)?;
                }
                Ok(Flow::Normal)
            }
            Stmt::Function(_) | Stmt::Empty => Ok(Flow::Normal),
            Stmt::Expr(expr) => {
                self.eval(expr, scope)?;
                Ok(Flow::Normal)
            }
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    self.exec(consequent, scope)
                } else if let Some(alternate) = alternate {
                    self.exec(alternate, scope)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { test, body } => {
                while self.eval(test, scope)?.truthy() {
                    match self.exec(body, scope)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::DoWhile { body, test } => {
                loop {
                    match self.exec(body, scope)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if !self.eval(test, scope)?.truthy() {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => self.exec_for(init.as_deref(), test.as_ref(), update.as_ref(), body, scope),
            Stmt::ForOf {
                kind,
                name,
                iterable,
                body,
            } => self.exec_for_of(*kind, name, iterable, body, scope),
            Stmt::Block(body) => self.exec_block(body, scope),
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
            Stmt::Switch {
                discriminant,
                cases,
            } => self.exec_switch(discriminant, cases, scope),
            Stmt::Throw(expr) => {
                let value = self.eval(expr, scope)?;
                Err(Abort::Throw(value))
            }
            Stmt::Try {
                block,
                param,
                handler,
                finalizer,
            } => self.exec_try(block, param.as_deref(), handler.as_deref(), finalizer.as_deref(), scope),
        }
    }

    fn declare(
        &mut self,
        kind: DeclKind,
        name: &str,
        init: Option<&Expr>,
        scope: &ScopeRef,
    ) -> Eval<()> {
        match kind {
            DeclKind::Var => {
                if let Some(init) = init {
                    let value = self.eval(init, scope)?;
                    self.assign_var(name, value, scope)?;
                }
            }
            DeclKind::Let | DeclKind::Const => {
                let value = match init {
                    Some(init) => self.eval(init, scope)?,
                    None => Value::Undefined,
                };
                scope
                    .borrow_mut()
                    .declare(name, Some(value), kind == DeclKind::Let);
            }
        }
        Ok(())
    }

    fn exec_for(
        &mut self,
        init: Option<&Stmt>,
        test: Option<&Expr>,
        update: Option<&Expr>,
        body: &Stmt,
        scope: &ScopeRef,
    ) -> Eval<Flow> {
        let loop_scope = Scope::child(scope);
        let mut per_iteration: Vec<String> = Vec::new();
        if let Some(init) = init {
            if let Stmt::Decl {
                kind: DeclKind::Let | DeclKind::Const,
                decls,
            } = init
            {
                per_iteration = decls.iter().map(|(name, _)| name.clone()).collect();
                self.declare_block(std::slice::from_ref(init), &loop_scope)?;
            }
            self.exec(init, &loop_scope)?;
        }

        // Each iteration sees its own copy of `let` bindings so closures capture per-iteration values.
        let mut iteration = copy_iteration(&loop_scope, &loop_scope, &per_iteration);
        loop {
            if let Some(test) = test {
                if !self.eval(test, &iteration)?.truthy() {
                    break;
                }
            }
            match self.exec(body, &iteration)? {
                Flow::Break => break,
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Normal | Flow::Continue => {}
            }
            iteration = copy_iteration(&iteration, &loop_scope, &per_iteration);
            if let Some(update) = update {
                self.eval(update, &iteration)?;
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_for_of(
        &mut self,
        kind: DeclKind,
        name: &str,
        iterable: &Expr,
        body: &Stmt,
        scope: &ScopeRef,
    ) -> Eval<Flow> {
        let source = self.eval(iterable, scope)?;
        match &source {
            Value::Str(_) | Value::Array(_) => {}
            other => {
                let described = match iterable {
                    Expr::Ident(_) | Expr::Member { .. } => iterable.describe(),
                    _ => other.to_js_string(),
                };
                return throw("TypeError", format!("{described} is not iterable"));
            }
        }

        // Array index, or byte offset into a string.
        let mut index = 0;
        loop {
            let (item, width) = match &source {
                Value::Array(items) => (items.borrow().get(index).cloned(), 1),
                Value::Str(s) => match s[index..].chars().next() {
                    Some(c) => (Some(Value::from(c.to_string())), c.len_utf8()),
                    None => (None, 0),
                },
                _ => (None, 0),
            };
            let Some(item) = item else { break };
            index += width;

            let iteration = Scope::child(scope);
            if kind == DeclKind::Var {
                self.assign_var(name, item, scope)?;
            } else {
                iteration
                    .borrow_mut()
                    .declare(name, Some(item), kind == DeclKind::Let);
            }
            match self.exec(body, &iteration)? {
                Flow::Break => break,
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Normal | Flow::Continue => {}
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_switch(
        &mut self,
        discriminant: &Expr,
        cases: &[SwitchCase],
        scope: &ScopeRef,
    ) -> Eval<Flow> {
        let value = self.eval(discriminant, scope)?;
        let inner = Scope::child(scope);
        for case in cases {
            self.declare_block(&case.body, &inner)?;
        }

        let mut start = None;
        for (index, case) in cases.iter().enumerate() {
            if let Some(test) = &case.test {
                let candidate = self.eval(test, &inner)?;
                if strict_equals(&value, &candidate) {
                    start = Some(index);
                    break;
                }
            }
        }
        let start = start.or_else(|| cases.iter().position(|case| case.test.is_none()));
        let Some(start) = start else {
            return Ok(Flow::Normal);
        };

        for case in &cases[start..] {
            for stmt in &case.body {
                match self.exec(stmt, &inner)? {
                    Flow::Normal => {}
                    Flow::Break => return Ok(Flow::Normal),
                    flow => return Ok(flow),
                }
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_try(
        &mut self,
        block: &[Stmt],
        param: Option<&str>,
        handler: Option<&[Stmt]>,
        finalizer: Option<&[Stmt]>,
        scope: &ScopeRef,
    ) -> Eval<Flow> {
        let result = match (self.exec_block(block, scope), handler) {
            (Err(Abort::Throw(thrown)), Some(handler)) => {
                let catch_scope = Scope::child(scope);
                if let Some(param) = param {
                    catch_scope.borrow_mut().declare(param, Some(thrown), true);
                }
                self.exec_block(handler, &catch_scope)
            }
            (result, _) => result,
        };

        let Some(finalizer) = finalizer else {
            return result;
        };
        if let Err(Abort::Halt(_)) = result {
            return result;
        }
        match self.exec_block(finalizer, scope)? {
            Flow::Normal => result,
            flow => Ok(flow),
        }
    }

    // ─── expressions ──────────────────────────────────────────────────────────

    pub(crate) fn eval(&mut self, expr: &Expr, scope: &ScopeRef) -> Eval<Value> {
        match expr {
            Expr::Num(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::Str(Rc::clone(s))),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Template { quasis, exprs } => {
                let mut out = String::new();
                for (index, quasi) in quasis.iter().enumerate() {
                    push_text(&mut out, quasi)?;
                    if let Some(expr) = exprs.get(index) {
                        let piece = self.eval(expr, scope)?.to_js_string();
                        push_text(&mut out, &piece)?;
                    }
                }
                self.new_string(out)
            }
            Expr::Ident(name) => self.lookup_var(name, scope),
            Expr::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item, scope)?);
                }
                self.new_array(values)
            }
            Expr::Object(props) => {
                let mut object = JsObject::default();
                for (key, value) in props {
                    let key = match key {
                        PropKey::Named(name) => name.clone(),
                        PropKey::Computed(expr) => self.eval(expr, scope)?.to_property_key(),
                    };
                    let value = self.eval(value, scope)?;
                    object.set(&key, value);
                }
                self.new_object(object)
            }
            Expr::Function(def) => {
                self.capture(scope)?;
                Ok(Value::Function(Rc::new(Closure {
                    def: Rc::clone(def),
                    env: Rc::clone(scope),
                })))
            }
            Expr::Unary { op, arg } => self.eval_unary(*op, arg, scope),
            Expr::Update {
                increment,
                prefix,
                target,
            } => {
                let reference = self.resolve(target, scope)?;
                let old = self.get_ref(&reference, scope)?.to_number();
                let new = if *increment { old + 1.0 } else { old - 1.0 };
                self.put_ref(&reference, Value::Number(new), scope)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;
                self.binary(*op, &left, &right)
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left, scope)?;
                let short_circuit = match op {
                    LogicalOp::And => !left.truthy(),
                    LogicalOp::Or => left.truthy(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(right, scope)
                }
            }
            Expr::Assign { op, target, value } => {
                let reference = self.resolve(target, scope)?;
                let value = match op {
                    None => self.eval(value, scope)?,
                    Some(op) => {
                        let current = self.get_ref(&reference, scope)?;
                        let rhs = self.eval(value, scope)?;
                        self.binary(*op, &current, &rhs)?
                    }
                };
                self.put_ref(&reference, value.clone(), scope)?;
                Ok(value)
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
            Expr::Call { callee, args } => self.eval_call(callee, args, scope),
            Expr::New { callee, args } => {
                let constructor = self.eval(callee, scope)?;
                let args = self.eval_args(args, scope)?;
                match constructor {
                    Value::Native(builtin) if builtin.is_constructor() => {
                        builtins::construct(self, builtin, &args)
                    }
                    _ => throw(
                        "TypeError",
                        format!("{} is not a constructor", callee.describe()),
                    ),
                }
            }
            Expr::Member { object, property } => {
                let object = self.eval(object, scope)?;
                get_property(&object, property)
            }
            Expr::Index { object, index } => {
                let object = self.eval(object, scope)?;
                let key = self.eval(index, scope)?.to_property_key();
                get_property(&object, &key)
            }
        }
    }

    fn eval_unary(&mut self, op: UnaryOp, arg: &Expr, scope: &ScopeRef) -> Eval<Value> {
        if op == UnaryOp::TypeOf {
            // `typeof undeclared` is not an error.
            if let Expr::Ident(name) = arg {
                if let Lookup::Missing = scope::lookup(scope, name) {
                    return Ok(Value::from("undefined"));
                }
            }
            return Ok(Value::from(self.eval(arg, scope)?.type_of()));
        }
        let value = self.eval(arg, scope)?;
        Ok(match op {
            UnaryOp::Not => Value::Bool(!value.truthy()),
            UnaryOp::Neg => Value::Number(-value.to_number()),
            UnaryOp::Plus | UnaryOp::TypeOf => Value::Number(value.to_number()),
        })
    }

    fn eval_args(&mut self, args: &[Expr], scope: &ScopeRef) -> Eval<Vec<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, scope)?);
        }
        Ok(values)
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr], scope: &ScopeRef) -> Eval<Value> {
        let function = match callee {
            Expr::Member { object, property } => {
                let receiver = self.eval(object, scope)?;
                get_property(&receiver, property)?
            }
            Expr::Index { object, index } => {
                let receiver = self.eval(object, scope)?;
                let key = self.eval(index, scope)?.to_property_key();
                get_property(&receiver, &key)?
            }
            _ => self.eval(callee, scope)?,
        };
        let args = self.eval_args(args, scope)?;
        if !function.is_callable() {
            return throw(
                "TypeError",
                format!("{} is not a function", callee.describe()),
            );
        }
        self.call_value(&function, args)
    }

    /// Invoke any callable value; used for direct calls and builtin callbacks.
    pub(crate) fn call_value(&mut self, function: &Value, args: Vec<Value>) -> Eval<Value> {
        match function {
            Value::Function(closure) => self.call_closure(closure, args),
            Value::Native(builtin) => builtins::call_native(self, *builtin, args),
            Value::Method(method) => {
                builtins::call_method(self, &method.receiver, &method.name, args)
            }
            other => throw(
                "TypeError",
                format!("{} is not a function", other.to_js_string()),
            ),
        }
    }

    fn call_closure(&mut self, closure: &Rc<Closure>, args: Vec<Value>) -> Eval<Value> {
        self.tick()?;
        if self.depth >= self.budget.max_call_depth {
            return throw("RangeError", "Maximum call stack size exceeded");
        }
        self.depth += 1;
        let result = self.invoke(closure, args);
        self.depth -= 1;
        result
    }

    fn invoke(&mut self, closure: &Rc<Closure>, args: Vec<Value>) -> Eval<Value> {
        let def = &closure.def;
        let scope = Scope::child(&closure.env);
        if let Some(name) = &def.name {
            scope
                .borrow_mut()
                .declare(name, Some(Value::Function(Rc::clone(closure))), true);
        }

        let mut args = args.into_iter();
        for param in &def.params {
            let mut value = args.next().unwrap_or_default();
            if let (Value::Undefined, Some(default)) = (&value, &param.default) {
                value = self.eval(default, &scope)?;
            }
            scope.borrow_mut().declare(&param.name, Some(value), true);
        }

        match &def.body {
            FunctionBody::Expr(expr) => self.eval(expr, &scope),
            FunctionBody::Block(body) => match self.run_body(body, &scope)? {
                Flow::Return(value) => Ok(value),
                _ => Ok(Value::Undefined),
            },
        }
    }

    // ─── bindings and references ──────────────────────────────────────────────

    fn lookup_var(&self, name: &str, scope: &ScopeRef) -> Eval<Value> {
        match scope::lookup(scope, name) {
            Lookup::Found(value) => Ok(value),
            Lookup::Uninitialized => throw(
                "ReferenceError",
                format!("Cannot access '{name}' before initialization"),
            ),
            Lookup::Missing => throw("ReferenceError", format!("{name} is not defined")),
        }
    }

    fn assign_var(&self, name: &str, value: Value, scope: &ScopeRef) -> Eval<()> {
        match scope::assign(scope, name, value) {
            Ok(()) => Ok(()),
            Err(AssignError::Constant) => throw("TypeError", "Assignment to constant variable."),
            Err(AssignError::Uninitialized) => throw(
                "ReferenceError",
                format!("Cannot access '{name}' before initialization"),
            ),
            Err(AssignError::Missing) => {
                throw("ReferenceError", format!("{name} is not defined"))
            }
        }
    }

    fn resolve(&mut self, target: &Expr, scope: &ScopeRef) -> Eval<Reference> {
        match target {
            Expr::Ident(name) => Ok(Reference::Binding(name.clone())),
            Expr::Member { object, property } => {
                let object = self.eval(object, scope)?;
                Ok(Reference::Property(object, property.clone()))
            }
            Expr::Index { object, index } => {
                let object = self.eval(object, scope)?;
                let key = self.eval(index, scope)?.to_property_key();
                Ok(Reference::Property(object, key))
            }
            _ => throw("SyntaxError", "Invalid left-hand side in assignment"),
        }
    }

    fn get_ref(&mut self, reference: &Reference, scope: &ScopeRef) -> Eval<Value> {
        match reference {
            Reference::Binding(name) => self.lookup_var(name, scope),
            Reference::Property(object, key) => get_property(object, key),
        }
    }

    fn put_ref(&mut self, reference: &Reference, value: Value, scope: &ScopeRef) -> Eval<()> {
        match reference {
            Reference::Binding(name) => self.assign_var(name, value, scope),
            Reference::Property(object, key) => self.set_property(object, key, value),
        }
    }

    /// Predeclare `let`/`const` (uninitialized) and bind function declarations.
    fn declare_block(&mut self, body: &[Stmt], scope: &ScopeRef) -> Eval<()> {
        if body.iter().any(|stmt| matches!(stmt, Stmt::Function(_))) {
            self.capture(scope)?;
        }
        let mut env = scope.borrow_mut();
        for stmt in body {
            match stmt {
                Stmt::Decl {
                    kind: kind @ (DeclKind::Let | DeclKind::Const),
                    decls,
                } => {
                    for (name, _) in decls {
                        env.declare(name, None, *kind == DeclKind::Let);
                    }
                }
                Stmt::Function(def) => {
                    if let Some(name) = &def.name {
                        let closure = Closure {
                            def: Rc::clone(def),
                            env: Rc::clone(scope),
                        };
                        env.declare(name, Some(Value::Function(Rc::new(closure))), true);
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn set_property(&mut self, object: &Value, key: &str, value: Value) -> Eval<()> {
        match object {
            Value::Undefined | Value::Null => throw(
                "TypeError",
                format!(
                    "Cannot set properties of {} (setting '{key}')",
                    object.to_js_string()
                ),
            ),
            Value::Array(items) => {
                let current = items.borrow().len();
                if key == "length" {
                    let len = value.to_number();
                    if len < 0.0 || len.fract() != 0.0 || len > MAX_ARRAY_LEN as f64 {
                        return throw("RangeError", "Invalid array length");
                    }
                    let len = len as usize;
                    self.grow_array(items, len.saturating_sub(current))?;
                    items.borrow_mut().resize(len, Value::Undefined);
                } else if let Some(index) = array_index(key) {
                    if index >= MAX_ARRAY_LEN {
                        return throw("RangeError", "Invalid array length");
                    }
                    self.grow_array(items, (index + 1).saturating_sub(current))?;
                    let mut items = items.borrow_mut();
                    if index >= items.len() {
                        items.resize(index + 1, Value::Undefined);
                    }
                    items[index] = value;
                }
                Ok(())
            }
            Value::Object(obj) => {
                self.heap.adopt_object(obj);
                let is_new = obj.borrow().props.iter().all(|(k, _)| k != key);
                if is_new {
                    self.charge(key.len() + SLOT_BYTES)?;
                }
                obj.borrow_mut().set(key, value);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// `+` may build a string, so it is checked against the string cap here;
    /// every other operator goes through [`binary_op`].
    fn binary(&mut self, op: BinaryOp, left: &Value, right: &Value) -> Eval<Value> {
        if op != BinaryOp::Add {
            return Ok(binary_op(op, left, right));
        }
        let (left, right) = (to_primitive(left), to_primitive(right));
        if matches!(left, Value::Str(_)) || matches!(right, Value::Str(_)) {
            let mut out = left.to_js_string();
            push_text(&mut out, &right.to_js_string())?;
            self.new_string(out)
        } else {
            Ok(Value::Number(left.to_number() + right.to_number()))
        }
    }
}

// ─── helpers ──────────────────────────────────────────────────────────────────

fn uncaught(value: &Value) -> ExecutionError {
    match value.error_data() {
        Some(data) => ExecutionError::Uncaught {
            name: data.name,
            message: data.message,
        },
        None => ExecutionError::Uncaught {
            name: value.type_of().to_owned(),
            message: value.to_js_string(),
        },
    }
}

/// Bind every `var` in a function body (not nested functions) to `undefined`.
fn hoist_vars(body: &[Stmt], env: &mut Scope) {
    for stmt in body {
        match stmt {
            Stmt::Decl {
                kind: DeclKind::Var,
                decls,
            } => {
                for (name, _) in decls {
                    if !env.has_own(name) {
                        env.declare(name, Some(Value::Undefined), true);
                    }
                }
            }
            Stmt::ForOf {
                kind: DeclKind::Var,
                name,
                body,
                ..
            } => {
                if !env.has_own(name) {
                    env.declare(name, Some(Value::Undefined), true);
                }
                hoist_vars(std::slice::from_ref(body), env);
            }
            Stmt::If {
                consequent,
                alternate,
                ..
            } => {
                hoist_vars(std::slice::from_ref(consequent), env);
                if let Some(alternate) = alternate {
                    hoist_vars(std::slice::from_ref(alternate), env);
                }
            }
            Stmt::While { body, .. } | Stmt::DoWhile { body, .. } | Stmt::ForOf { body, .. } => {
                hoist_vars(std::slice::from_ref(body), env);
            }
            Stmt::For { init, body, .. } => {
                if let Some(init) = init {
                    hoist_vars(std::slice::from_ref(init), env);
                }
                hoist_vars(std::slice::from_ref(body), env);
            }
            Stmt::Block(inner) => hoist_vars(inner, env),
            Stmt::Switch { cases, .. } => {
                for case in cases {
                    hoist_vars(&case.body, env);
                }
            }
            Stmt::Try {
                block,
                handler,
                finalizer,
                ..
            } => {
                hoist_vars(block, env);
                if let Some(handler) = handler {
                    hoist_vars(handler, env);
                }
                if let Some(finalizer) = finalizer {
                    hoist_vars(finalizer, env);
                }
            }
            _ => {}
        }
    }
}

fn copy_iteration(from: &ScopeRef, loop_scope: &ScopeRef, names: &[String]) -> ScopeRef {
    if names.is_empty() {
        return Rc::clone(loop_scope);
    }
    let next = Scope::child(loop_scope);
    {
        let source = from.borrow();
        let mut target = next.borrow_mut();
        for name in names {
            source.copy_binding(name, &mut target);
        }
    }
    next
}

fn array_index(key: &str) -> Option<usize> {
    let index = key.parse::<usize>().ok()?;
    (index.to_string() == key).then_some(index)
}

fn to_primitive(value: &Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) | Value::Function(_) | Value::Native(_) | Value::Method(_) => {
            Value::from(value.to_js_string())
        }
        other => other.clone(),
    }
}

/// Arithmetic and comparison. String `+` is handled by [`Interpreter::binary`].
fn binary_op(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => {
            Value::Number(to_primitive(left).to_number() + to_primitive(right).to_number())
        }
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Pow => {
            let (base, exponent) = (left.to_number(), right.to_number());
            if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
                Value::Number(f64::NAN)
            } else {
                Value::Number(base.powf(exponent))
            }
        }
        BinaryOp::Eq => Value::Bool(loose_equals(left, right)),
        BinaryOp::NotEq => Value::Bool(!loose_equals(left, right)),
        BinaryOp::StrictEq => Value::Bool(strict_equals(left, right)),
        BinaryOp::StrictNotEq => Value::Bool(!strict_equals(left, right)),
        BinaryOp::Lt | BinaryOp::Gt | BinaryOp::LtEq | BinaryOp::GtEq => {
            Value::Bool(relational(op, &to_primitive(left), &to_primitive(right)))
        }
    }
}

fn relational(op: BinaryOp, left: &Value, right: &Value) -> bool {
    use std::cmp::Ordering;

    let ordering = match (left, right) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    };
    let Some(ordering) = ordering else {
        return false;
    };
    match op {
        BinaryOp::Lt => ordering == Ordering::Less,
        BinaryOp::Gt => ordering == Ordering::Greater,
        BinaryOp::LtEq => ordering != Ordering::Greater,
        _ => ordering != Ordering::Less,
    }
}

/// Property read with the engine's nullish-receiver message.
pub(crate) fn get_property(object: &Value, key: &str) -> Eval<Value> {
    let value = match object {
        Value::Undefined | Value::Null => {
            return throw(
                "TypeError",
                format!(
                    "Cannot read properties of {} (reading '{key}')",
                    object.to_js_string()
                ),
            );
        }
        Value::Str(s) => {
            if key == "length" {
                Value::Number(s.encode_utf16().count() as f64)
            } else if let Some(index) = array_index(key) {
                s.chars()
                    .nth(index)
                    .map_or(Value::Undefined, |c| Value::from(c.to_string()))
            } else if builtins::is_string_method(key) {
                builtins::bind(object, key)
            } else {
                Value::Undefined
            }
        }
        Value::Array(items) => {
            if key == "length" {
                Value::Number(items.borrow().len() as f64)
            } else if let Some(index) = array_index(key) {
                items.borrow().get(index).cloned().unwrap_or_default()
            } else if builtins::is_array_method(key) {
                builtins::bind(object, key)
            } else {
                Value::Undefined
            }
        }
        Value::Object(obj) => obj.borrow().get(key).unwrap_or_default(),
        Value::Number(_) if builtins::is_number_method(key) => builtins::bind(object, key),
        Value::Bool(_) if key == "toString" => builtins::bind(object, key),
        Value::Native(builtin) => builtins::static_property(*builtin, key).unwrap_or_default(),
        Value::Function(closure) => match key {
            "name" => Value::from(closure.name()),
            "length" => Value::Number(closure.def.params.len() as f64),
            _ => Value::Undefined,
        },
        Value::Method(method) if key == "name" => Value::from(method.name.as_str()),
        _ => Value::Undefined,
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_program;
    use crate::sink::CaptureBuffer;

    fn run(source: &str) -> (String, Result<(), ExecutionError>) {
        let program = parse_program(source).expect("test program parses");
        let mut buffer = CaptureBuffer::new(64 * 1024, false);
        let result = Interpreter::new(&mut buffer, ExecutionBudget::default()).run(&program);
        (buffer.into_string(), result)
    }

    fn output(source: &str) -> String {
        let (text, result) = run(source);
        assert!(result.is_ok(), "unexpected fault: {result:?}");
        text
    }

    #[test]
    fn closures_capture_per_iteration_bindings() {
        let text = output(
            "const fns = [];\nfor (let i = 0; i < 3; i++) { fns.push(() => i); }\nconsole.log(fns.map(f => f()).join(','));",
        );
        assert_eq!(text, "0,1,2\n");
    }

    #[test]
    fn var_is_function_scoped_and_hoisted() {
        let text = output("console.log(typeof v);\nif (true) { var v = 3; }\nconsole.log(v);");
        assert_eq!(text, "undefined\n3\n");
    }

    #[test]
    fn function_declarations_are_hoisted() {
        assert_eq!(output("console.log(twice(4));\nfunction twice(n) { return n * 2; }"), "8\n");
    }

    #[test]
    fn temporal_dead_zone_is_reported() {
        let (_, result) = run("console.log(x);\nlet x = 1;");
        assert_eq!(
            result.unwrap_err().to_string(),
            "Cannot access 'x' before initialization"
        );
    }

    #[test]
    fn const_reassignment_throws_type_error() {
        let (_, result) = run("const total = 1;\ntotal = 2;");
        assert_eq!(
            result.unwrap_err(),
            ExecutionError::Uncaught {
                name: "TypeError".into(),
                message: "Assignment to constant variable.".into()
            }
        );
    }

    #[test]
    fn switch_falls_through_until_break() {
        let text = output(
            "function kind(d) { switch (d) { case 'sat': case 'sun': return 'weekend'; default: return 'weekday'; } }\nconsole.log(kind('sun'), kind('mon'));",
        );
        assert_eq!(text, "weekend weekday\n");
    }

    #[test]
    fn finally_runs_after_catch() {
        let text = output(
            "try { throw new Error('boom'); } catch (e) { console.log(e.message); } finally { console.log('done'); }",
        );
        assert_eq!(text, "boom\ndone\n");
    }

    #[test]
    fn reading_from_undefined_names_the_property() {
        let (_, result) = run("let user;\nconsole.log(user.name);");
        assert_eq!(
            result.unwrap_err().to_string(),
            "Cannot read properties of undefined (reading 'name')"
        );
    }

    #[test]
    fn calling_a_non_function_names_the_callee() {
        let (_, result) = run("const obj = {};\nobj.run();");
        assert_eq!(result.unwrap_err().to_string(), "obj.run is not a function");
    }

    #[test]
    fn string_concatenation_and_coercion() {
        assert_eq!(output("console.log('5' + 3, '5' - 3, [1, 2] + '');"), "53 2 1,2\n");
    }

    #[test]
    fn run_end_releases_cyclic_values() {
        let program = parse_program(
            "function outer() { function inner() { return 1; } return inner; }\nconst keep = outer();\nconst o = {};\no.me = o;\nconst a = [];\na.push(a);\nconst f = () => f;",
        )
        .expect("test program parses");
        let mut buffer = CaptureBuffer::new(1024, false);
        let mut interp = Interpreter::new(&mut buffer, ExecutionBudget::default());
        assert!(interp.evaluate(&program).is_ok());
        let handles = interp.heap.handles();
        assert!(handles.len() >= 5, "only {} handles retained", handles.len());
        assert!(handles.iter().all(|handle| handle.upgrade().is_some()));

        drop(interp);
        assert!(handles.iter().all(|handle| handle.upgrade().is_none()));
    }

    #[test]
    fn compound_assignment_evaluates_target_once() {
        let text = output("const a = [1, 2];\nlet i = 0;\na[i++] += 10;\nconsole.log(a.join(','), i);");
        assert_eq!(text, "11,2 1\n");
    }
}
