use crate::architecture::RegisterId::*;
use crate::architecture::{Architecture, Register};

const AMD64REGISTERS: &[Register] = &[
    Register::new(Rax, 64, Rax, 0),
    Register::new(Eax, 32, Rax, 0),
    Register::new(Ax, 16, Rax, 0),
    Register::new(Al, 8, Rax, 0),
    Register::new(Ah, 8, Rax, 8),
    Register::new(Rbx, 64, Rbx, 0),
    Register::new(Ebx, 32, Rbx, 0),
    Register::new(Bx, 16, Rbx, 0),
    Register::new(Bl, 8, Rbx, 0),
    Register::new(Bh, 8, Rbx, 8),
    Register::new(Rcx, 64, Rcx, 0),
    Register::new(Ecx, 32, Rcx, 0),
    Register::new(Cx, 16, Rcx, 0),
    Register::new(Cl, 8, Rcx, 0),
    Register::new(Ch, 8, Rcx, 8),
    Register::new(Rdx, 64, Rdx, 0),
    Register::new(Edx, 32, Rdx, 0),
    Register::new(Dx, 16, Rdx, 0),
    Register::new(Dl, 8, Rdx, 0),
    Register::new(Dh, 8, Rdx, 8),
    Register::new(Rsi, 64, Rsi, 0),
    Register::new(Esi, 32, Rsi, 0),
    Register::new(Si, 16, Rsi, 0),
    Register::new(Rdi, 64, Rdi, 0),
    Register::new(Edi, 32, Rdi, 0),
    Register::new(Di, 16, Rdi, 0),
    Register::new(Rbp, 64, Rbp, 0),
    Register::new(Ebp, 32, Rbp, 0),
    Register::new(Bp, 16, Rbp, 0),
    Register::new(Rsp, 64, Rsp, 0),
    Register::new(Esp, 32, Rsp, 0),
    Register::new(Sp, 16, Rsp, 0),
    Register::new(R8, 64, R8, 0),
    Register::new(R8d, 32, R8, 0),
    Register::new(R9, 64, R9, 0),
    Register::new(R9d, 32, R9, 0),
    Register::new(R10, 64, R10, 0),
    Register::new(R10d, 32, R10, 0),
    Register::new(R11, 64, R11, 0),
    Register::new(R11d, 32, R11, 0),
    Register::new(R12, 64, R12, 0),
    Register::new(R12d, 32, R12, 0),
    Register::new(R13, 64, R13, 0),
    Register::new(R13d, 32, R13, 0),
    Register::new(R14, 64, R14, 0),
    Register::new(R14d, 32, R14, 0),
    Register::new(R15, 64, R15, 0),
    Register::new(R15d, 32, R15, 0),
    Register::new(Rip, 64, Rip, 0),
    Register::new(Eip, 32, Rip, 0),
    Register::new(Cf, 1, Cf, 0),
    Register::new(Pf, 1, Pf, 0),
    Register::new(Af, 1, Af, 0),
    Register::new(Zf, 1, Zf, 0),
    Register::new(Sf, 1, Sf, 0),
    Register::new(Of, 1, Of, 0),
    Register::new(Df, 1, Df, 0),
    Register::new(Xmm0, 128, Xmm0, 0),
    Register::new(Xmm1, 128, Xmm1, 0),
    Register::new(Xmm2, 128, Xmm2, 0),
    Register::new(Xmm3, 128, Xmm3, 0),
    Register::new(Xmm4, 128, Xmm4, 0),
    Register::new(Xmm5, 128, Xmm5, 0),
    Register::new(Xmm6, 128, Xmm6, 0),
    Register::new(Xmm7, 128, Xmm7, 0),
    Register::new(Xmm8, 128, Xmm8, 0),
    Register::new(Xmm9, 128, Xmm9, 0),
    Register::new(Xmm10, 128, Xmm10, 0),
    Register::new(Xmm11, 128, Xmm11, 0),
    Register::new(Xmm12, 128, Xmm12, 0),
    Register::new(Xmm13, 128, Xmm13, 0),
    Register::new(Xmm14, 128, Xmm14, 0),
    Register::new(Xmm15, 128, Xmm15, 0),
];

const X86REGISTERS: &[Register] = &[
    Register::new(Eax, 32, Eax, 0),
    Register::new(Ax, 16, Eax, 0),
    Register::new(Al, 8, Eax, 0),
    Register::new(Ah, 8, Eax, 8),
    Register::new(Ebx, 32, Ebx, 0),
    Register::new(Bx, 16, Ebx, 0),
    Register::new(Bl, 8, Ebx, 0),
    Register::new(Bh, 8, Ebx, 8),
    Register::new(Ecx, 32, Ecx, 0),
    Register::new(Cx, 16, Ecx, 0),
    Register::new(Cl, 8, Ecx, 0),
    Register::new(Ch, 8, Ecx, 8),
    Register::new(Edx, 32, Edx, 0),
    Register::new(Dx, 16, Edx, 0),
    Register::new(Dl, 8, Edx, 0),
    Register::new(Dh, 8, Edx, 8),
    Register::new(Esi, 32, Esi, 0),
    Register::new(Si, 16, Esi, 0),
    Register::new(Edi, 32, Edi, 0),
    Register::new(Di, 16, Edi, 0),
    Register::new(Ebp, 32, Ebp, 0),
    Register::new(Bp, 16, Ebp, 0),
    Register::new(Esp, 32, Esp, 0),
    Register::new(Sp, 16, Esp, 0),
    Register::new(Eip, 32, Eip, 0),
    Register::new(Cf, 1, Cf, 0),
    Register::new(Pf, 1, Pf, 0),
    Register::new(Af, 1, Af, 0),
    Register::new(Zf, 1, Zf, 0),
    Register::new(Sf, 1, Sf, 0),
    Register::new(Of, 1, Of, 0),
    Register::new(Df, 1, Df, 0),
    Register::new(Xmm0, 128, Xmm0, 0),
    Register::new(Xmm1, 128, Xmm1, 0),
    Register::new(Xmm2, 128, Xmm2, 0),
    Register::new(Xmm3, 128, Xmm3, 0),
    Register::new(Xmm4, 128, Xmm4, 0),
    Register::new(Xmm5, 128, Xmm5, 0),
    Register::new(Xmm6, 128, Xmm6, 0),
    Register::new(Xmm7, 128, Xmm7, 0),
];

/// The 64-bit X86 Architecture.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Amd64 {}

impl Amd64 {
    pub fn new() -> Amd64 {
        Amd64 {}
    }
}

impl Architecture for Amd64 {
    fn name(&self) -> &'static str {
        "amd64"
    }

    fn word_size(&self) -> usize {
        64
    }

    fn registers(&self) -> &'static [Register] {
        AMD64REGISTERS
    }

    fn program_counter(&self) -> Register {
        Register::new(Rip, 64, Rip, 0)
    }

    fn stack_pointer(&self) -> Register {
        Register::new(Rsp, 64, Rsp, 0)
    }

    /// A 32-bit write to a general purpose register clears the upper 32 bits
    /// of its parent. 8 and 16-bit writes leave the rest of the parent intact.
    fn zero_extends(&self, register: &Register) -> bool {
        !register.is_parent() && register.bits() == 32 && register.offset() == 0
    }
}

/// The 32-bit X86 Architecture.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct X86 {}

impl X86 {
    pub fn new() -> X86 {
        X86 {}
    }
}

impl Architecture for X86 {
    fn name(&self) -> &'static str {
        "x86"
    }

    fn word_size(&self) -> usize {
        32
    }

    fn registers(&self) -> &'static [Register] {
        X86REGISTERS
    }

    fn program_counter(&self) -> Register {
        Register::new(Eip, 32, Eip, 0)
    }

    fn stack_pointer(&self) -> Register {
        Register::new(Esp, 32, Esp, 0)
    }

    fn zero_extends(&self, _: &Register) -> bool {
        false
    }
}
