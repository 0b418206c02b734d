use std::collections::HashMap;

use tracing::{debug, instrument, trace, warn};

use crate::ast::{Expression, FunctionDecl, NodeId, Program, Statement, VariableDecl};
use crate::error::{ResolveError, ResolveResult};

pub const BUILTIN_PRINT: &str = "print";
pub const BUILTIN_PRINTF: &str = "printf";
pub const BUILTIN_EXEC: &str = "exec";

pub const BUILTIN_FUNCTIONS: &[&str] = &[BUILTIN_PRINT, BUILTIN_PRINTF, BUILTIN_EXEC];

pub fn is_builtin(name: &str) -> bool {
    BUILTIN_FUNCTIONS.contains(&name)
}

pub type SymbolId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Function,
    // Reserved with their keywords; nothing declares these yet
    Class,
    Interface,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Declaration<'a> {
    Function(&'a FunctionDecl),
    Variable(&'a VariableDecl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol<'a> {
    pub name: &'a str,
    pub kind: SymbolKind,
    pub decl: Declaration<'a>,
}

impl<'a> Symbol<'a> {
    pub fn function(decl: &'a FunctionDecl) -> Self {
        Self {
            name: &decl.name,
            kind: SymbolKind::Function,
            decl: Declaration::Function(decl),
        }
    }

    pub fn variable(decl: &'a VariableDecl) -> Self {
        Self {
            name: &decl.name,
            kind: SymbolKind::Variable,
            decl: Declaration::Variable(decl),
        }
    }
}

/// Flat, scope-free table: every declared name is unique program-wide.
#[derive(Debug, Default)]
pub struct SymbolTable<'a> {
    symbols: Vec<Symbol<'a>>,
    by_name: HashMap<&'a str, SymbolId>,
}

impl<'a> SymbolTable<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self, symbol: Symbol<'a>) -> ResolveResult<SymbolId> {
        if self.by_name.contains_key(symbol.name) {
            return Err(ResolveError::DuplicateSymbol(symbol.name.to_string()));
        }
        let symbol_id = self.symbols.len();
        self.by_name.insert(symbol.name, symbol_id);
        self.symbols.push(symbol);
        Ok(symbol_id)
    }

    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: SymbolId) -> Option<&Symbol<'a>> {
        self.symbols.get(id)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Outcome of resolution: the symbol table plus the link from every
/// resolved reference node to its symbol. Builtin calls have no entry.
#[derive(Debug)]
pub struct Resolution<'a> {
    symbols: SymbolTable<'a>,
    references: HashMap<NodeId, SymbolId>,
}

impl<'a> Resolution<'a> {
    pub fn symbols(&self) -> &SymbolTable<'a> {
        &self.symbols
    }

    pub fn symbol_for(&self, id: NodeId) -> Option<&Symbol<'a>> {
        self.references
            .get(&id)
            .and_then(|symbol_id| self.symbols.get(*symbol_id))
    }

    pub fn function_for(&self, id: NodeId) -> Option<&'a FunctionDecl> {
        match self.symbol_for(id)?.decl {
            Declaration::Function(decl) => Some(decl),
            Declaration::Variable(_) => None,
        }
    }

    pub fn resolved_count(&self) -> usize {
        self.references.len()
    }

    /// Every resolved reference with the name it links to, in node order.
    pub fn references(&self) -> Vec<(NodeId, &'a str)> {
        let mut references: Vec<_> = self
            .references
            .iter()
            .filter_map(|(id, symbol_id)| Some((*id, self.symbols.get(*symbol_id)?.name)))
            .collect();
        references.sort_by_key(|(id, _)| id.0);
        references
    }
}

/// Run both passes: collect declarations, then link references.
#[instrument(skip_all)]
pub fn resolve(program: &Program) -> ResolveResult<Resolution<'_>> {
    let mut enter = Enter {
        symbols: SymbolTable::new(),
    };
    enter.visit_statements(&program.statements)?;
    debug!(symbols = enter.symbols.len(), "entered declarations");

    let mut resolver = RefResolver {
        symbols: &enter.symbols,
        references: HashMap::new(),
    };
    resolver.visit_statements(&program.statements)?;
    let references = resolver.references;
    debug!(references = references.len(), "resolved references");

    Ok(Resolution {
        symbols: enter.symbols,
        references,
    })
}

struct Enter<'a> {
    symbols: SymbolTable<'a>,
}

impl<'a> Enter<'a> {
    fn visit_statements(&mut self, statements: &'a [Statement]) -> ResolveResult<()> {
        for statement in statements {
            match statement {
                Statement::Function(decl) => {
                    if is_builtin(&decl.name) {
                        warn!("function {} is shadowed by the builtin of the same name", decl.name);
                    }
                    self.symbols.enter(Symbol::function(decl))?;
                    self.visit_statements(&decl.body.statements)?;
                }
                Statement::Variable(decl) => {
                    self.symbols.enter(Symbol::variable(decl))?;
                }
                Statement::Import { .. } | Statement::Expression(_) => {}
            }
        }
        Ok(())
    }
}

struct RefResolver<'a, 't> {
    symbols: &'t SymbolTable<'a>,
    references: HashMap<NodeId, SymbolId>,
}

impl RefResolver<'_, '_> {
    fn visit_statements(&mut self, statements: &[Statement]) -> ResolveResult<()> {
        for statement in statements {
            match statement {
                Statement::Function(decl) => self.visit_statements(&decl.body.statements)?,
                Statement::Variable(decl) => {
                    if let Some(init) = &decl.init {
                        self.visit_expression(init)?;
                    }
                }
                Statement::Expression(expr) => self.visit_expression(expr)?,
                Statement::Import { .. } => {}
            }
        }
        Ok(())
    }

    fn visit_expression(&mut self, expr: &Expression) -> ResolveResult<()> {
        match expr {
            Expression::FunctionCall { id, name, args } => {
                self.resolve_call(*id, name)?;
                for arg in args {
                    self.visit_expression(arg)?;
                }
            }
            Expression::ExternalCall { args, .. } => {
                for arg in args {
                    self.visit_expression(arg)?;
                }
            }
            Expression::Variable { id, name } => self.resolve_variable(*id, name)?,
            Expression::Binary { left, right, .. } => {
                self.visit_expression(left)?;
                self.visit_expression(right)?;
            }
            Expression::StringLiteral(_)
            | Expression::IntegerLiteral(_)
            | Expression::DecimalLiteral(_)
            | Expression::BooleanLiteral(_)
            | Expression::NullLiteral => {}
        }
        Ok(())
    }

    fn resolve_call(&mut self, id: NodeId, name: &str) -> ResolveResult<()> {
        let symbol_id = self.symbols.lookup(name);
        let kind = symbol_id.and_then(|sid| self.symbols.get(sid)).map(|s| s.kind);
        match (symbol_id, kind) {
            (Some(symbol_id), Some(SymbolKind::Function)) => {
                trace!(%name, "resolved call");
                self.references.insert(id, symbol_id);
                Ok(())
            }
            _ if is_builtin(name) => Ok(()),
            (Some(_), _) => Err(ResolveError::NotAFunction(name.to_string())),
            (None, _) => Err(ResolveError::UndefinedFunction(name.to_string())),
        }
    }

    fn resolve_variable(&mut self, id: NodeId, name: &str) -> ResolveResult<()> {
        let Some(symbol_id) = self.symbols.lookup(name) else {
            return Err(ResolveError::UndefinedVariable(name.to_string()));
        };
        match self.symbols.get(symbol_id).map(|s| s.kind) {
            Some(SymbolKind::Variable) => {
                trace!(%name, "resolved variable");
                self.references.insert(id, symbol_id);
                Ok(())
            }
            _ => Err(ResolveError::NotAVariable(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn parse(input: &str) -> Program {
        Parser::new(input).parse().unwrap()
    }

    fn call_id(statement: &Statement) -> NodeId {
        match statement {
            Statement::Expression(Expression::FunctionCall { id, .. }) => *id,
            other => panic!("Expected call statement, got {:?}", other),
        }
    }

    #[test]
    fn test_symbol_table_rejects_duplicates() {
        let program = parse("let x = 1; let y = 2");
        let mut table = SymbolTable::new();
        let (first, second) = match (&program.statements[0], &program.statements[1]) {
            (Statement::Variable(a), Statement::Variable(b)) => (a, b),
            _ => unreachable!(),
        };
        let id = table.enter(Symbol::variable(first)).unwrap();
        assert_eq!(table.lookup("x"), Some(id));
        table.enter(Symbol::variable(second)).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.enter(Symbol::variable(first)),
            Err(ResolveError::DuplicateSymbol("x".to_string()))
        );
    }

    #[test]
    fn test_duplicate_variable() {
        let program = parse("let x = 1; let x = 2;");
        assert_eq!(
            resolve(&program).unwrap_err(),
            ResolveError::DuplicateSymbol("x".to_string())
        );
    }

    #[test]
    fn test_duplicate_function() {
        let program = parse("fn f() { } fn f() { print(1) }");
        assert_eq!(
            resolve(&program).unwrap_err(),
            ResolveError::DuplicateSymbol("f".to_string())
        );
    }

    #[test]
    fn test_duplicate_across_nesting_levels() {
        let program = parse("let x; fn f() { let x = 2 }");
        assert_eq!(
            resolve(&program).unwrap_err(),
            ResolveError::DuplicateSymbol("x".to_string())
        );
        let program = parse("let f; fn f() { }");
        assert_eq!(
            resolve(&program).unwrap_err(),
            ResolveError::DuplicateSymbol("f".to_string())
        );
    }

    #[test]
    fn test_undefined_function() {
        let program = parse("missing()");
        assert_eq!(
            resolve(&program).unwrap_err(),
            ResolveError::UndefinedFunction("missing".to_string())
        );
    }

    #[test]
    fn test_undefined_variable() {
        let program = parse("print(y)");
        assert_eq!(
            resolve(&program).unwrap_err(),
            ResolveError::UndefinedVariable("y".to_string())
        );
    }

    #[test]
    fn test_kind_mismatches() {
        let program = parse("let v = 1; v()");
        assert_eq!(
            resolve(&program).unwrap_err(),
            ResolveError::NotAFunction("v".to_string())
        );
        let program = parse("fn f() { } let a = f");
        assert_eq!(
            resolve(&program).unwrap_err(),
            ResolveError::NotAVariable("f".to_string())
        );
    }

    #[test]
    fn test_forward_references() {
        let program = parse("greet(); fn greet() { print(name) } let name = \"duang\"");
        let resolution = resolve(&program).unwrap();
        let decl = resolution.function_for(call_id(&program.statements[0])).unwrap();
        assert_eq!(decl.name, "greet");
        // greet, name
        assert_eq!(resolution.resolved_count(), 2);
    }

    #[test]
    fn test_builtins_stay_unresolved() {
        let program = parse("print(1); printf(\"%d\", 2); exec(\"true\")");
        let resolution = resolve(&program).unwrap();
        assert_eq!(resolution.resolved_count(), 0);
        for statement in &program.statements {
            assert!(resolution.symbol_for(call_id(statement)).is_none());
        }
    }

    #[test]
    fn test_builtin_name_bound_to_variable_still_calls_builtin() {
        let program = parse("let print = 1; print(print)");
        let resolution = resolve(&program).unwrap();
        assert!(resolution.symbol_for(call_id(&program.statements[1])).is_none());
        assert_eq!(resolution.resolved_count(), 1);
    }

    #[test]
    fn test_external_call_arguments_are_resolved() {
        let program = parse("strings::ToUpper(nope)");
        assert_eq!(
            resolve(&program).unwrap_err(),
            ResolveError::UndefinedVariable("nope".to_string())
        );
    }

    #[test]
    fn test_dump_reports_resolution_status() {
        let program = parse("fn f() { } f(); print(1)");
        let resolution = resolve(&program).unwrap();
        let dump = program.dump(Some(&resolution));
        assert!(dump.contains("FunctionCall f, resolved"));
        assert!(dump.contains("FunctionCall print, not resolved"));
        assert_eq!(resolution.symbols().len(), 1);
    }

    #[test]
    fn test_references_are_listed_in_node_order() {
        let program = parse("let a = 1; fn f() { a } f(); a");
        let resolution = resolve(&program).unwrap();
        let names: Vec<_> = resolution
            .references()
            .into_iter()
            .map(|(_, name)| name)
            .collect();
        assert_eq!(names, vec!["a", "f", "a"]);
    }
}
