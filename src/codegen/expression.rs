use super::{FunctionGenerator, Label, Operand, Width};
use crate::ast::{Comparison, Expression, ExpressionKind};
use crate::symbol_table::SymbolId;
use crate::types::{Type, SIZEOF_DOUBLE, SIZEOF_INT};
use log::trace;

/// An assignable location. Dereferences keep the pointer value so the
/// address can be loaded into `%ecx` right before the access.
#[derive(Debug, Clone)]
pub(super) enum Place {
    Direct(Operand),
    Indirect(Operand),
}

#[derive(Debug, Clone, Copy)]
enum Arithmetic {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Arithmetic {
    fn x87(self) -> &'static str {
        match self {
            Arithmetic::Add => "faddl",
            Arithmetic::Subtract => "fsubl",
            Arithmetic::Multiply => "fmull",
            Arithmetic::Divide => "fdivl",
        }
    }
}

fn set_condition(op: Comparison, ty: &Type) -> &'static str {
    // x87 flags after `sahf` and pointer comparisons read as unsigned
    let unsigned = ty.is_real() || ty.is_pointer();
    match (op, unsigned) {
        (Comparison::Less, false) => "setl",
        (Comparison::Greater, false) => "setg",
        (Comparison::LessEqual, false) => "setle",
        (Comparison::GreaterEqual, false) => "setge",
        (Comparison::Less, true) => "setb",
        (Comparison::Greater, true) => "seta",
        (Comparison::LessEqual, true) => "setbe",
        (Comparison::GreaterEqual, true) => "setae",
        (Comparison::Equal, _) => "sete",
        (Comparison::NotEqual, _) => "setne",
    }
}

impl<'g> FunctionGenerator<'g> {
    /// Lowers `expr` and returns where its value can be read.
    pub(super) fn expression(&mut self, expr: &Expression) -> Operand {
        match &expr.kind {
            ExpressionKind::Integer(value) => Operand::Immediate(i64::from(*value)),

            ExpressionKind::Real(text) => {
                let label = self.labels.next();
                self.pool.add_double(label, text);
                Operand::Label(label)
            }

            ExpressionKind::String(value) => {
                let label = self.labels.next();
                self.pool.add_string(label, value);
                Operand::Label(label)
            }

            ExpressionKind::Identifier(id) => self.symbol_operand(*id),

            ExpressionKind::Call { callee, args } => self.call(*callee, args, &expr.ty),

            ExpressionKind::Not(operand) => {
                let value = self.expression(operand);
                self.compare_zero(&value, &operand.ty);
                let result = self.temporary(&expr.ty);
                self.out.op1("sete", "%al");
                self.out.op2("movzbl", "%al", "%eax");
                self.out.op2("movl", "%eax", &result);
                result
            }

            ExpressionKind::Negate(operand) => {
                let value = self.expression(operand);
                let result = self.temporary(&expr.ty);
                if expr.ty.is_real() {
                    self.out.op1("fldl", &value);
                    self.out.op0("fchs");
                    self.out.op1("fstpl", &result);
                } else {
                    self.load(&value, Width::of(&operand.ty), "%eax");
                    self.out.op1("negl", "%eax");
                    self.out.op2("movl", "%eax", &result);
                }
                result
            }

            ExpressionKind::Dereference(pointer) => {
                let address = self.expression(pointer);
                let result = self.temporary(&expr.ty);
                self.out.op2("movl", &address, "%eax");
                match Width::of(&expr.ty) {
                    Width::Double => {
                        self.out.op1("fldl", "(%eax)");
                        self.out.op1("fstpl", &result);
                    }
                    Width::Byte => {
                        self.out.op2("movb", "(%eax)", "%cl");
                        self.out.op2("movb", "%cl", &result);
                    }
                    Width::Long => {
                        self.out.op2("movl", "(%eax)", "%eax");
                        self.out.op2("movl", "%eax", &result);
                    }
                }
                result
            }

            ExpressionKind::Address(operand) => {
                let place = self.place(operand);
                let result = self.temporary(&expr.ty);
                match place {
                    Place::Indirect(pointer) => self.out.op2("movl", &pointer, "%eax"),
                    Place::Direct(value) if value.is_immediate() => {
                        self.out.op2("movl", &value, "%eax")
                    }
                    Place::Direct(value) => self.out.op2("leal", &value, "%eax"),
                }
                self.out.op2("movl", "%eax", &result);
                result
            }

            ExpressionKind::Increment { operand, scale } => self.step(expr, operand, *scale, true),
            ExpressionKind::Decrement { operand, scale } => {
                self.step(expr, operand, *scale, false)
            }

            ExpressionKind::Cast(operand) => self.cast(&expr.ty, operand),

            ExpressionKind::Multiply { left, right } => {
                self.arithmetic(Arithmetic::Multiply, &expr.ty, left, right, 0, 0)
            }
            ExpressionKind::Divide { left, right } => {
                self.arithmetic(Arithmetic::Divide, &expr.ty, left, right, 0, 0)
            }
            ExpressionKind::Add {
                left,
                right,
                scale_left,
                scale_right,
            } => self.arithmetic(
                Arithmetic::Add,
                &expr.ty,
                left,
                right,
                *scale_left,
                *scale_right,
            ),
            ExpressionKind::Subtract {
                left,
                right,
                scale_right,
                scale_result,
            } => {
                let result = self.arithmetic(
                    Arithmetic::Subtract,
                    &expr.ty,
                    left,
                    right,
                    0,
                    *scale_right,
                );
                if *scale_result > 1 {
                    // pointer difference counts elements, not bytes
                    self.out.op2("movl", &result, "%eax");
                    self.out.op2("movl", format!("${}", scale_result), "%ecx");
                    self.out.op0("cltd");
                    self.out.op1("idivl", "%ecx");
                    self.out.op2("movl", "%eax", &result);
                }
                result
            }

            ExpressionKind::Remainder { left, right } => {
                let lhs = self.expression(left);
                let rhs = self.expression(right);
                let result = self.temporary(&expr.ty);
                self.load(&lhs, Width::of(&left.ty), "%eax");
                self.load(&rhs, Width::of(&right.ty), "%ecx");
                self.out.op0("cltd");
                self.out.op1("idivl", "%ecx");
                self.out.op2("movl", "%edx", &result);
                result
            }

            ExpressionKind::Compare { op, left, right } => {
                let lhs = self.expression(left);
                let rhs = self.expression(right);
                let result = self.temporary(&expr.ty);
                if left.ty.is_real() {
                    self.out.op1("fldl", &lhs);
                    self.out.op1("fcompl", &rhs);
                    self.out.op1("fnstsw", "%ax");
                    self.out.op0("sahf");
                } else {
                    self.load(&lhs, Width::of(&left.ty), "%eax");
                    self.load(&rhs, Width::of(&right.ty), "%ecx");
                    self.out.op2("cmpl", "%ecx", "%eax");
                }
                self.out.op1(set_condition(*op, &left.ty), "%al");
                self.out.op2("movzbl", "%al", "%eax");
                self.out.op2("movl", "%eax", &result);
                result
            }

            ExpressionKind::LogicalAnd { left, right } => {
                self.logical(&expr.ty, left, right, false)
            }
            ExpressionKind::LogicalOr { left, right } => self.logical(&expr.ty, left, right, true),
        }
    }

    /// Lowers an lvalue without reading it.
    pub(super) fn place(&mut self, expr: &Expression) -> Place {
        match &expr.kind {
            ExpressionKind::Dereference(pointer) => Place::Indirect(self.expression(pointer)),
            _ => Place::Direct(self.expression(expr)),
        }
    }

    /// Turns a place into an operand, loading the address into `%ecx` when
    /// the place is reached through a pointer.
    pub(super) fn resolve(&mut self, place: &Place) -> Operand {
        match place {
            Place::Direct(operand) => operand.clone(),
            Place::Indirect(pointer) => {
                self.out.op2("movl", pointer, "%ecx");
                Operand::Indirect("%ecx")
            }
        }
    }

    /// Loads an integer-class value into a 32-bit register, sign extending
    /// chars.
    pub(super) fn load(&mut self, value: &Operand, width: Width, register: &str) {
        if width == Width::Byte && !value.is_immediate() {
            self.out.op2("movsbl", value, register);
        } else {
            self.out.op2("movl", value, register);
        }
    }

    /// Jumps to `target` when `test` evaluates to zero.
    pub(super) fn branch_if_false(&mut self, test: &Expression, target: Label) {
        let value = self.expression(test);
        self.compare_zero(&value, &test.ty);
        self.out.op1("je", target);
    }

    fn compare_zero(&mut self, value: &Operand, ty: &Type) {
        if ty.is_real() {
            self.out.op1("fldl", value);
            self.out.op0("ftst");
            self.out.op1("fnstsw", "%ax");
            self.out.op1("fstp", "%st(0)");
            self.out.op0("sahf");
        } else {
            self.load(value, Width::of(ty), "%eax");
            self.out.op2("cmpl", "$0", "%eax");
        }
    }

    fn temporary(&mut self, ty: &Type) -> Operand {
        Operand::Frame(self.frame.allocate(Width::of(ty).size()))
    }

    fn symbol_operand(&self, id: SymbolId) -> Operand {
        let symbol = self.symbols.symbol(id);
        if symbol.offset == 0 {
            Operand::Global(format!("{}{}", self.prefix, symbol.name))
        } else {
            Operand::Frame(symbol.offset)
        }
    }

    fn call(&mut self, callee: SymbolId, args: &[Expression], ty: &Type) -> Operand {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push((self.expression(arg), Width::of(&arg.ty)));
        }

        let mut offset = 0;
        for (value, width) in &values {
            let slot = Operand::Outgoing(offset);
            if *width == Width::Double {
                self.out.op1("fldl", value);
                self.out.op1("fstpl", &slot);
                offset += SIZEOF_DOUBLE;
            } else {
                self.load(value, *width, "%eax");
                self.out.op2("movl", "%eax", &slot);
                offset += SIZEOF_INT;
            }
        }
        self.frame.reserve_arguments(offset);

        let name = format!("{}{}", self.prefix, self.symbols.symbol(callee).name);
        trace!("call {} with {} argument bytes", name, offset);
        self.out.op1("call", &name);

        let result = self.temporary(ty);
        match Width::of(ty) {
            Width::Double => self.out.op1("fstpl", &result),
            Width::Byte => self.out.op2("movb", "%al", &result),
            Width::Long => self.out.op2("movl", "%eax", &result),
        }
        result
    }

    /// `++` and `--`: the result is the old value, the place gets the new one.
    fn step(&mut self, expr: &Expression, operand: &Expression, scale: u32, up: bool) -> Operand {
        let place = self.place(operand);
        let result = self.temporary(&expr.ty);
        let target = self.resolve(&place);

        match Width::of(&operand.ty) {
            Width::Double => {
                self.out.op1("fldl", &target);
                self.out.op1("fstl", &result);
                self.out.op0("fld1");
                if !up {
                    self.out.op0("fchs");
                }
                self.out.op2("faddp", "%st", "%st(1)");
                self.out.op1("fstpl", &target);
            }
            Width::Byte => {
                self.out.op2("movb", &target, "%al");
                self.out.op2("movb", "%al", &result);
                let opcode = if up { "addb" } else { "subb" };
                self.out.op2(opcode, format!("${}", scale), "%al");
                self.out.op2("movb", "%al", &target);
            }
            Width::Long => {
                self.out.op2("movl", &target, "%eax");
                self.out.op2("movl", "%eax", &result);
                let opcode = if up { "addl" } else { "subl" };
                self.out.op2(opcode, format!("${}", scale), "%eax");
                self.out.op2("movl", "%eax", &target);
            }
        }
        result
    }

    fn cast(&mut self, target: &Type, operand: &Expression) -> Operand {
        let value = self.expression(operand);
        let result = self.temporary(target);
        let from = Width::of(&operand.ty);

        match (from, Width::of(target)) {
            (Width::Double, Width::Double) => {
                self.out.op1("fldl", &value);
                self.out.op1("fstpl", &result);
            }
            (Width::Double, Width::Long) => {
                self.out.op1("fldl", &value);
                self.out.op1("fisttpl", &result);
            }
            (Width::Double, Width::Byte) => {
                let scratch = self.temporary(&Type::int());
                self.out.op1("fldl", &value);
                self.out.op1("fisttpl", &scratch);
                self.out.op2("movl", &scratch, "%eax");
                self.out.op2("movb", "%al", &result);
            }
            (_, Width::Double) => {
                let source = if from == Width::Long && !value.is_immediate() {
                    value
                } else {
                    let scratch = self.temporary(&Type::int());
                    self.load(&value, from, "%eax");
                    self.out.op2("movl", "%eax", &scratch);
                    scratch
                };
                self.out.op1("fildl", &source);
                self.out.op1("fstpl", &result);
            }
            (_, Width::Long) => {
                self.load(&value, from, "%eax");
                self.out.op2("movl", "%eax", &result);
            }
            (_, Width::Byte) => {
                self.load(&value, from, "%eax");
                self.out.op2("movb", "%al", &result);
            }
        }
        result
    }

    fn arithmetic(
        &mut self,
        op: Arithmetic,
        ty: &Type,
        left: &Expression,
        right: &Expression,
        scale_left: u32,
        scale_right: u32,
    ) -> Operand {
        let lhs = self.expression(left);
        let rhs = self.expression(right);
        let result = self.temporary(ty);

        if ty.is_real() {
            self.out.op1("fldl", &lhs);
            self.out.op1(op.x87(), &rhs);
            self.out.op1("fstpl", &result);
            return result;
        }

        self.load(&lhs, Width::of(&left.ty), "%eax");
        if scale_left > 1 {
            self.out.op2("imull", format!("${}", scale_left), "%eax");
        }
        self.load(&rhs, Width::of(&right.ty), "%ecx");
        if scale_right > 1 {
            self.out.op2("imull", format!("${}", scale_right), "%ecx");
        }

        match op {
            Arithmetic::Add => self.out.op2("addl", "%ecx", "%eax"),
            Arithmetic::Subtract => self.out.op2("subl", "%ecx", "%eax"),
            Arithmetic::Multiply => self.out.op2("imull", "%ecx", "%eax"),
            Arithmetic::Divide => {
                self.out.op0("cltd");
                self.out.op1("idivl", "%ecx");
            }
        }
        self.out.op2("movl", "%eax", &result);
        result
    }

    /// `&&` and `||` evaluate the right operand only when it decides the
    /// result.
    fn logical(&mut self, ty: &Type, left: &Expression, right: &Expression, or: bool) -> Operand {
        let decided = self.labels.next();
        let end = self.labels.next();
        let result = self.temporary(ty);
        let jump = if or { "jne" } else { "je" };

        let lhs = self.expression(left);
        self.compare_zero(&lhs, &left.ty);
        self.out.op1(jump, decided);

        let rhs = self.expression(right);
        self.compare_zero(&rhs, &right.ty);
        self.out.op1(jump, decided);

        let (fallthrough, shortcut) = if or { (0, 1) } else { (1, 0) };
        self.out.op2("movl", format!("${}", fallthrough), &result);
        self.out.op1("jmp", end);
        self.out.label(decided);
        self.out.op2("movl", format!("${}", shortcut), &result);
        self.out.label(end);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::super::Generator;
    use crate::diagnostics::Diagnostics;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::semantic::Checker;

    fn body(source: &str) -> String {
        let tokens = Lexer::new(source).tokenize().unwrap();
        let mut parser = Parser::new(tokens.into_iter(), Checker::new(Diagnostics::new("t.c")));
        let mut generator = Generator::new("");
        parser
            .parse(|function, symbols| {
                generator.generate_function(&function, symbols);
                Ok(())
            })
            .unwrap();
        let checker = parser.finish();
        assert!(
            checker.diagnostics().is_empty(),
            "{:?}",
            checker.diagnostics().messages()
        );
        generator.finish()
    }

    #[test]
    fn test_division_and_remainder() {
        let asm = body("int f(int a, int b) { return a / b + a % b; }");
        assert!(asm.contains("\tcltd\n\tidivl\t%ecx\n\tmovl\t%eax, "));
        assert!(asm.contains("\tcltd\n\tidivl\t%ecx\n\tmovl\t%edx, "));
    }

    #[test]
    fn test_pointer_arithmetic_scales() {
        let asm = body("int *f(int *p, int n) { return p + n; }");
        assert!(asm.contains("\tmovl\t12(%ebp), %ecx\n\timull\t$4, %ecx\n\taddl\t%ecx, %eax\n"));

        let asm = body("int f(double *p, double *q) { return p - q; }");
        assert!(asm.contains("\tsubl\t%ecx, %eax\n"));
        assert!(asm.contains("\tmovl\t$8, %ecx\n\tcltd\n\tidivl\t%ecx\n"));

        let asm = body("char *f(char *p, int n) { return n + p; }");
        assert!(!asm.contains("imull"));
    }

    #[test]
    fn test_array_index_loads_through_pointer() {
        let asm = body("int a[10]; int f(int i) { return a[i]; }");
        assert!(asm.contains("\tleal\ta, %eax\n"));
        assert!(asm.contains("\timull\t$4, %ecx\n"));
        assert!(asm.contains("\tmovl\t(%eax), %eax\n"));
    }

    #[test]
    fn test_store_through_pointer() {
        let asm = body("int f(char *p) { *p = 65; return 0; }");
        assert!(asm.contains("\tmovb\t%al, (%ecx)\n"));
    }

    #[test]
    fn test_comparisons() {
        let asm = body("int f(int a, int b) { return a <= b; }");
        assert!(asm.contains("\tcmpl\t%ecx, %eax\n\tsetle\t%al\n\tmovzbl\t%al, %eax\n"));

        let asm = body("int f(double a, double b) { return a < b; }");
        assert!(asm.contains("\tfldl\t8(%ebp)\n\tfcompl\t16(%ebp)\n\tfnstsw\t%ax\n\tsahf\n\tsetb\t%al\n"));

        let asm = body("int f(int *p, int *q) { return p >= q; }");
        assert!(asm.contains("\tsetae\t%al\n"));
    }

    #[test]
    fn test_mixed_arithmetic_converts_to_double() {
        let asm = body("double f(int n, double x) { return n * x; }");
        assert!(asm.contains("\tfildl\t8(%ebp)\n"));
        assert!(asm.contains("\tfmull\t12(%ebp)\n"));
    }

    #[test]
    fn test_casts() {
        let asm = body("int f(double x) { return (int) x; }");
        assert!(asm.contains("\tfldl\t8(%ebp)\n\tfisttpl\t"));

        let asm = body("int f(char c) { return c; }");
        assert!(asm.contains("\tmovsbl\t8(%ebp), %eax\n"));

        let asm = body("double f(void) { double x; x = 3; return x; }");
        assert!(asm.contains(":\t.double\t3\n"));
    }

    #[test]
    fn test_not_and_negate() {
        let asm = body("int f(int n) { return !n; }");
        assert!(asm.contains("\tcmpl\t$0, %eax\n\tsete\t%al\n"));

        let asm = body("double f(double x) { return -x; }");
        assert!(asm.contains("\tfldl\t8(%ebp)\n\tfchs\n\tfstpl\t"));
        assert!(asm.contains("\tfldl\t-8(%ebp)\n\tjmp\t.L0\n"));
    }

    #[test]
    fn test_increment_returns_old_value() {
        let asm = body("int f(int n) { return n++; }");
        assert!(asm.contains(
            "\tmovl\t8(%ebp), %eax\n\tmovl\t%eax, -4(%ebp)\n\taddl\t$1, %eax\n\tmovl\t%eax, 8(%ebp)\n"
        ));

        let asm = body("int *f(int *p) { p--; return p; }");
        assert!(asm.contains("\tsubl\t$4, %eax\n"));

        let asm = body("double f(double x) { x++; return x; }");
        assert!(asm.contains("\tfld1\n\tfaddp\t%st, %st(1)\n\tfstpl\t8(%ebp)\n"));
    }

    #[test]
    fn test_logical_operators_short_circuit() {
        let asm = body("int g(void); int f(int a) { return a && g(); }");
        let branch = asm.find("\tje\t.L1\n").unwrap();
        let call = asm.find("\tcall\tg\n").unwrap();
        assert!(branch < call);
        assert!(asm.contains("\tmovl\t$1, -4(%ebp)\n\tjmp\t.L2\n.L1:\n\tmovl\t$0, -4(%ebp)\n.L2:\n"));

        let asm = body("int f(int a, int b) { return a || b; }");
        assert!(asm.contains("\tjne\t.L1\n"));
        assert!(asm.contains("\tmovl\t$0, -4(%ebp)\n\tjmp\t.L2\n.L1:\n\tmovl\t$1, -4(%ebp)\n"));
    }

    #[test]
    fn test_call_copies_arguments_to_stack() {
        let asm = body("int g(int a, double b); int f(void) { return g(1, 2.5); }");
        assert!(asm.contains("\tmovl\t$1, %eax\n\tmovl\t%eax, 0(%esp)\n"));
        assert!(asm.contains("\tfstpl\t4(%esp)\n\tcall\tg\n\tmovl\t%eax, "));
    }

    #[test]
    fn test_string_argument_is_address() {
        let asm = body("int puts(char *s); int main(void) { puts(\"hi\"); return 0; }");
        assert!(asm.contains("\tleal\t.L1, %eax\n"));
        assert!(asm.contains(".L1:\t.asciz\t\"hi\"\n"));
    }
}
