//! AArch64 Entry Point
//!
//! The GPU firmware loads the image at 0x80000 and starts core 0 at
//! `_start`. Cores 1-3 stay in the firmware's spin loop until
//! [`crate::multicore::start_core`] releases them.

use core::arch::global_asm;

global_asm!(
    r#"
.section .text.boot
.global _start

_start:
    // Only core 0 runs the boot path
    mrs     x0, mpidr_el1
    and     x0, x0, #0xFF
    cbnz    x0, .Lpark

    ldr     x1, =__core0_stack_top
    mov     sp, x1

    // Clear BSS
    ldr     x0, =__bss_start
    ldr     x1, =__bss_end
.Lclear_bss:
    cmp     x0, x1
    b.ge    .Ldone_bss
    str     xzr, [x0], #8
    b       .Lclear_bss
.Ldone_bss:

    bl      kernel_main

.Lpark:
    wfe
    b       .Lpark
"#
);
