//! i386 assembly generation in AT&T syntax.
//!
//! Every expression is evaluated into its own stack temporary and the result
//! is read back from there. `%eax`, `%ecx` and `%edx` are scratch registers
//! and doubles go through the x87 stack, which is empty between expressions.

mod emitter;
mod expression;
mod frame;
mod operand;
mod pool;

pub use emitter::Emitter;
pub use frame::{Frame, PARAMETER_BASE, SIZEOF_REG, STACK_ALIGNMENT};
pub use operand::{Label, Operand, Width};

use crate::ast::{Block, Expression, Function, Statement};
use crate::symbol_table::{ScopeId, SymbolTable};
use log::{debug, trace};
use operand::LabelAllocator;
use pool::LiteralPool;

pub struct Generator {
    out: Emitter,
    labels: LabelAllocator,
    global_prefix: String,
}

impl Generator {
    /// `global_prefix` is prepended to every global and function name, for
    /// targets whose C symbols carry a leading underscore.
    pub fn new(global_prefix: impl Into<String>) -> Self {
        Self {
            out: Emitter::new(),
            labels: LabelAllocator::default(),
            global_prefix: global_prefix.into(),
        }
    }

    pub fn generate_function(&mut self, function: &Function, symbols: &mut SymbolTable) {
        let name = format!(
            "{}{}",
            self.global_prefix,
            symbols.symbol(function.symbol).name
        );
        debug!("generating {}", name);

        let mut frame = Frame::new();
        frame.bind_parameters(symbols, function.body.scope, function.parameters);
        frame.bind_locals(symbols, function.body.scope, function.parameters);
        let return_label = self.labels.next();

        self.out.section(".text");
        self.out.label(&name);
        self.out.op1("pushl", "%ebp");
        self.out.op2("movl", "%esp", "%ebp");
        self.out.op2("subl", format!("${}.size", name), "%esp");

        let mut body = FunctionGenerator {
            out: &mut self.out,
            labels: &mut self.labels,
            prefix: &self.global_prefix,
            symbols,
            frame,
            pool: LiteralPool::new(),
            breaks: Vec::new(),
            return_label,
        };
        for statement in &function.body.statements {
            body.statement(statement);
        }
        let (frame, pool) = body.finish();

        self.out.blank();
        self.out.label(return_label);
        self.out.op2("movl", "%ebp", "%esp");
        self.out.op1("popl", "%ebp");
        self.out.op0("ret");
        self.out.blank();
        self.out
            .directive(".set", format!("{}.size,{}", name, frame.size()));
        self.out.directive(".globl", &name);
        self.out.blank();
        debug!("{} uses a {} byte frame", name, frame.size());

        pool.flush(&mut self.out);
    }

    /// Reserves common storage for every variable declared in `scope`.
    pub fn generate_globals(&mut self, symbols: &SymbolTable, scope: ScopeId) {
        for id in symbols.ids(scope) {
            let symbol = symbols.symbol(id);
            if symbol.ty.is_function() || symbol.ty.is_error() {
                continue;
            }
            debug!("global {} of {} bytes", symbol.name, symbol.ty.size());
            self.out.directive(
                ".comm",
                format!("{}{},{}", self.global_prefix, symbol.name, symbol.ty.size()),
            );
        }
    }

    pub fn finish(self) -> String {
        self.out.into_string()
    }
}

/// Lowering state for the body of a single function.
pub(crate) struct FunctionGenerator<'g> {
    out: &'g mut Emitter,
    labels: &'g mut LabelAllocator,
    prefix: &'g str,
    symbols: &'g mut SymbolTable,
    frame: Frame,
    pool: LiteralPool,
    breaks: Vec<Label>,
    return_label: Label,
}

impl<'g> FunctionGenerator<'g> {
    fn finish(self) -> (Frame, LiteralPool) {
        (self.frame, self.pool)
    }

    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Expression(expr) => {
                self.expression(expr);
            }

            Statement::Assignment { left, right } => self.assignment(left, right),

            Statement::Break => match self.breaks.last() {
                Some(exit) => {
                    let exit = *exit;
                    self.out.op1("jmp", exit);
                }
                None => trace!("break with no enclosing loop"),
            },

            Statement::Return(expr) => {
                let value = self.expression(expr);
                match Width::of(&expr.ty) {
                    Width::Double => self.out.op1("fldl", &value),
                    width => self.load(&value, width, "%eax"),
                }
                self.out.op1("jmp", self.return_label);
            }

            Statement::Block(block) => self.block(block),

            Statement::While { test, body } => {
                let top = self.labels.next();
                let exit = self.labels.next();

                self.out.label(top);
                self.branch_if_false(test, exit);
                self.loop_body(body, exit);
                self.out.op1("jmp", top);
                self.out.label(exit);
            }

            Statement::For {
                init,
                test,
                increment,
                body,
            } => {
                let top = self.labels.next();
                let exit = self.labels.next();

                self.statement(init);
                self.out.label(top);
                self.branch_if_false(test, exit);
                self.loop_body(body, exit);
                self.statement(increment);
                self.out.op1("jmp", top);
                self.out.label(exit);
            }

            Statement::If {
                test,
                then_branch,
                else_branch,
            } => {
                let skip = self.labels.next();
                self.branch_if_false(test, skip);
                self.statement(then_branch);

                match else_branch {
                    Some(else_branch) => {
                        let end = self.labels.next();
                        self.out.op1("jmp", end);
                        self.out.label(skip);
                        self.statement(else_branch);
                        self.out.label(end);
                    }
                    None => self.out.label(skip),
                }
            }
        }
    }

    fn block(&mut self, block: &Block) {
        self.frame.bind_locals(self.symbols, block.scope, 0);
        for statement in &block.statements {
            self.statement(statement);
        }
    }

    fn loop_body(&mut self, body: &Statement, exit: Label) {
        self.breaks.push(exit);
        self.statement(body);
        self.breaks.pop();
    }

    fn assignment(&mut self, left: &Expression, right: &Expression) {
        let value = self.expression(right);
        let place = self.place(left);

        match Width::of(&left.ty) {
            Width::Double => {
                self.out.op1("fldl", &value);
                let target = self.resolve(&place);
                self.out.op1("fstpl", &target);
            }
            Width::Byte => {
                self.out.op2("movb", &value, "%al");
                let target = self.resolve(&place);
                self.out.op2("movb", "%al", &target);
            }
            Width::Long => {
                self.load(&value, Width::of(&right.ty), "%eax");
                let target = self.resolve(&place);
                self.out.op2("movl", "%eax", &target);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::semantic::Checker;

    fn generate(source: &str) -> String {
        let tokens = Lexer::new(source).tokenize().unwrap();
        let mut parser = Parser::new(tokens.into_iter(), Checker::new(Diagnostics::new("test.c")));
        let mut generator = Generator::new("");
        parser
            .parse(|function, symbols| {
                generator.generate_function(&function, symbols);
                Ok(())
            })
            .unwrap();
        let checker = parser.finish();
        assert!(checker.diagnostics().is_empty(), "{:?}", checker.diagnostics().messages());
        generator.generate_globals(checker.symbols(), checker.outermost());
        generator.finish()
    }

    fn frame_size(assembly: &str, name: &str) -> u64 {
        let prefix = format!("\t.set\t{}.size,", name);
        assembly
            .lines()
            .find_map(|line| line.strip_prefix(&prefix))
            .unwrap()
            .parse()
            .unwrap()
    }

    #[test]
    fn test_prologue_and_epilogue() {
        let asm = generate("int main(void) { return 0; }");
        assert!(asm.contains(".text\nmain:\n\tpushl\t%ebp\n\tmovl\t%esp, %ebp\n\tsubl\t$main.size, %esp\n"));
        assert!(asm.contains("\tmovl\t$0, %eax\n\tjmp\t.L0\n"));
        assert!(asm.contains(".L0:\n\tmovl\t%ebp, %esp\n\tpopl\t%ebp\n\tret\n"));
        assert!(asm.contains("\t.globl\tmain\n"));
        assert_eq!(frame_size(&asm, "main") % STACK_ALIGNMENT, 8);
    }

    #[test]
    fn test_parameters_and_locals() {
        let asm = generate("int f(int a, int b) { double x; x = a; return a + b; }");
        assert!(asm.contains("\tfildl\t8(%ebp)\n"));
        assert!(asm.contains("\tfstpl\t-8(%ebp)\n"));
        assert!(asm.contains("\tmovl\t12(%ebp), %ecx\n"));
        assert_eq!(frame_size(&asm, "f") % STACK_ALIGNMENT, 8);
    }

    #[test]
    fn test_globals_use_common_storage() {
        let asm = generate("int x; char buf[10]; double *p; int f(void);");
        assert!(asm.contains("\t.comm\tx,4\n"));
        assert!(asm.contains("\t.comm\tbuf,10\n"));
        assert!(asm.contains("\t.comm\tp,4\n"));
        assert!(!asm.contains("\t.comm\tf,"));
    }

    #[test]
    fn test_global_prefix() {
        let tokens = Lexer::new("int x; int main(void) { x = 1; return x; }")
            .tokenize()
            .unwrap();
        let mut parser = Parser::new(tokens.into_iter(), Checker::new(Diagnostics::new("t.c")));
        let mut generator = Generator::new("_");
        parser
            .parse(|function, symbols| {
                generator.generate_function(&function, symbols);
                Ok(())
            })
            .unwrap();
        let checker = parser.finish();
        generator.generate_globals(checker.symbols(), checker.outermost());
        let asm = generator.finish();

        assert!(asm.contains("_main:\n"));
        assert!(asm.contains("\tmovl\t%eax, _x\n"));
        assert!(asm.contains("\t.comm\t_x,4\n"));
    }

    #[test]
    fn test_while_and_break() {
        let asm = generate("int f(int n) { while (n) { if (n < 3) break; n = n - 1; } return n; }");
        // .L0 return, .L1 loop top, .L2 loop exit, .L3 end of if
        assert!(asm.contains(".L1:\n\tmovl\t8(%ebp), %eax\n\tcmpl\t$0, %eax\n\tje\t.L2\n"));
        assert!(asm.contains("\tsetl\t%al\n"));
        assert!(asm.contains("\tjmp\t.L2\n"));
        assert!(asm.contains("\tjmp\t.L1\n.L2:\n"));
    }

    #[test]
    fn test_if_without_else_has_no_jump_around() {
        let asm = generate("int f(int n) { if (n) n = 1; return n; }");
        assert!(asm.contains("\tje\t.L1\n"));
        assert!(asm.contains("\tmovl\t%eax, 8(%ebp)\n.L1:\n"));
    }

    #[test]
    fn test_if_else() {
        let asm = generate("int f(int n) { if (n) n = 1; else n = 2; return n; }");
        assert!(asm.contains("\tjmp\t.L2\n.L1:\n"));
        assert!(asm.contains("\tmovl\t$2, %eax\n\tmovl\t%eax, 8(%ebp)\n.L2:\n"));
    }

    #[test]
    fn test_for_loop() {
        let asm = generate("int f(void) { int i, s; s = 0; for (i = 0; i < 10; i++) s = s + i; return s; }");
        assert!(asm.contains("\tmovl\t$0, %eax\n\tmovl\t%eax, -4(%ebp)\n.L1:\n"));
        assert!(asm.contains("\tjmp\t.L1\n.L2:\n"));
        assert!(asm.contains("\taddl\t$1, %eax\n"));
    }

    #[test]
    fn test_literals_flushed_after_each_function() {
        let asm = generate(
            "int printf(char *s, ...); int main(void) { printf(\"%f\\n\", 1.5); return 0; }",
        );
        let data = asm.find(".data\n").unwrap();
        assert!(data > asm.find("\t.globl\tmain\n").unwrap());
        assert!(asm.contains(":\t.asciz\t\"%f\\n\"\n"));
        assert!(asm.contains(":\t.double\t1.5\n"));
    }

    #[test]
    fn test_labels_unique_across_functions() {
        let asm = generate("int f(void) { return 1; } int g(void) { return 2; }");
        assert!(asm.contains("\tjmp\t.L0\n"));
        assert!(asm.contains("\tjmp\t.L1\n"));
    }

    #[test]
    fn test_nested_block_locals_continue_frame() {
        let asm = generate("int f(void) { int a; { int b; b = 2; a = b; } return a; }");
        assert!(asm.contains("\tmovl\t%eax, -8(%ebp)\n"));
        assert!(asm.contains("\tmovl\t-8(%ebp), %eax\n\tmovl\t%eax, -4(%ebp)\n"));
    }
}
