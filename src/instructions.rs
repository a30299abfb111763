//! Built-in AVR vocabulary: instruction mnemonics, assembler directives and
//! register names.

use once_cell::sync::Lazy;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub mnemonic: &'static str,
    /// Operand signature, empty when the instruction takes none
    pub operands: &'static str,
    pub summary: &'static str,
}

impl Instruction {
    pub fn takes_operands(&self) -> bool {
        !self.operands.is_empty()
    }

    /// Text inserted on completion; operands follow after a space.
    pub fn insert_text(&self) -> String {
        if self.takes_operands() {
            format!("{} ", self.mnemonic)
        } else {
            self.mnemonic.to_string()
        }
    }

    pub fn is_directive(&self) -> bool {
        self.mnemonic.starts_with('.')
    }
}

macro_rules! instructions {
    ($(($mnemonic:literal, $operands:literal, $summary:literal)),* $(,)?) => {
        &[$(Instruction { mnemonic: $mnemonic, operands: $operands, summary: $summary }),*]
    };
}

pub static INSTRUCTIONS: &[Instruction] = instructions![
    ("adc", "Rd, Rr", "Add with Carry"),
    ("add", "Rd, Rr", "Add without Carry"),
    ("adiw", "Rd, K", "Add Immediate to Word"),
    ("and", "Rd, Rr", "Logical AND"),
    ("andi", "Rd, K", "Logical AND with Immediate"),
    ("asr", "Rd", "Arithmetic Shift Right"),
    ("bclr", "s", "Bit Clear in SREG"),
    ("bld", "Rd, b", "Bit Load from the T Flag in SREG to a Bit in Register"),
    ("brbc", "s, k", "Branch if Bit in SREG is Cleared"),
    ("brbs", "s, k", "Branch if Bit in SREG is Set"),
    ("brcc", "k", "Branch if Carry Cleared"),
    ("brcs", "k", "Branch if Carry Set"),
    ("break", "", "Break"),
    ("breq", "k", "Branch if Equal"),
    ("brge", "k", "Branch if Greater or Equal (Signed)"),
    ("brhc", "k", "Branch if Half Carry Flag is Cleared"),
    ("brhs", "k", "Branch if Half Carry Flag is Set"),
    ("brid", "k", "Branch if Global Interrupt is Disabled"),
    ("brie", "k", "Branch if Global Interrupt is Enabled"),
    ("brlo", "k", "Branch if Lower (Unsigned)"),
    ("brlt", "k", "Branch if Less Than (Signed)"),
    ("brmi", "k", "Branch if Minus"),
    ("brne", "k", "Branch if Not Equal"),
    ("brpl", "k", "Branch if Plus"),
    ("brsh", "k", "Branch if Same or Higher (Unsigned)"),
    ("brtc", "k", "Branch if the T Flag is Cleared"),
    ("brts", "k", "Branch if the T Flag is Set"),
    ("brvc", "k", "Branch if Overflow Cleared"),
    ("brvs", "k", "Branch if Overflow Set"),
    ("bset", "s", "Bit Set in SREG"),
    ("bst", "Rd, b", "Bit Store from Bit in Register to T Flag in SREG"),
    ("call", "k", "Long Call to a Subroutine"),
    ("cbi", "A, b", "Clear Bit in I/O Register"),
    ("cbr", "Rd, K", "Clear Bits in Register"),
    ("clc", "", "Clear Carry Flag"),
    ("clh", "", "Clear Half Carry Flag"),
    ("cli", "", "Clear Global Interrupt Enable Bit"),
    ("cln", "", "Clear Negative Flag"),
    ("clr", "Rd", "Clear Register"),
    ("cls", "", "Clear Sign Flag"),
    ("clt", "", "Clear T Flag"),
    ("clv", "", "Clear Overflow Flag"),
    ("clz", "", "Clear Zero Flag"),
    ("com", "Rd", "One's Complement"),
    ("cp", "Rd, Rr", "Compare"),
    ("cpc", "Rd, Rr", "Compare with Carry"),
    ("cpi", "Rd, K", "Compare with Immediate"),
    ("cpse", "Rd, Rr", "Compare Skip if Equal"),
    ("dec", "Rd", "Decrement"),
    ("des", "K", "Data Encryption Standard"),
    ("eicall", "", "Extended Indirect Call to Subroutine"),
    ("eijmp", "", "Extended Indirect Jump"),
    ("elpm", "Rd, Z", "Extended Load Program Memory"),
    ("eor", "Rd, Rr", "Exclusive OR"),
    ("fmul", "Rd, Rr", "Fractional Multiply Unsigned"),
    ("fmuls", "Rd, Rr", "Fractional Multiply Signed"),
    ("fmulsu", "Rd, Rr", "Fractional Multiply Signed with Unsigned"),
    ("icall", "", "Indirect Call to Subroutine"),
    ("ijmp", "", "Indirect Jump"),
    ("in", "Rd, A", "Load an I/O Location to Register"),
    ("inc", "Rd", "Increment"),
    ("jmp", "k", "Jump"),
    ("lac", "Z, Rd", "Load and Clear"),
    ("las", "Z, Rd", "Load and Set"),
    ("lat", "Z, Rd", "Load and Toggle"),
    ("ld", "Rd, X", "Load Indirect from Data Space to Register"),
    ("ldd", "Rd, Y+q", "Load Indirect with Displacement"),
    ("ldi", "Rd, K", "Load Immediate"),
    ("lds", "Rd, k", "Load Direct from Data Space"),
    ("lpm", "Rd, Z", "Load Program Memory"),
    ("lsl", "Rd", "Logical Shift Left"),
    ("lsr", "Rd", "Logical Shift Right"),
    ("mov", "Rd, Rr", "Copy Register"),
    ("movw", "Rd, Rr", "Copy Register Word"),
    ("mul", "Rd, Rr", "Multiply Unsigned"),
    ("muls", "Rd, Rr", "Multiply Signed"),
    ("mulsu", "Rd, Rr", "Multiply Signed with Unsigned"),
    ("neg", "Rd", "Two's Complement"),
    ("nop", "", "No Operation"),
    ("or", "Rd, Rr", "Logical OR"),
    ("ori", "Rd, K", "Logical OR with Immediate"),
    ("out", "A, Rr", "Store Register to I/O Location"),
    ("pop", "Rd", "Pop Register from Stack"),
    ("push", "Rr", "Push Register on Stack"),
    ("rcall", "k", "Relative Call to Subroutine"),
    ("ret", "", "Return from Subroutine"),
    ("reti", "", "Return from Interrupt"),
    ("rjmp", "k", "Relative Jump"),
    ("rol", "Rd", "Rotate Left through Carry"),
    ("ror", "Rd", "Rotate Right through Carry"),
    ("sbc", "Rd, Rr", "Subtract with Carry"),
    ("sbci", "Rd, K", "Subtract Immediate with Carry"),
    ("sbi", "A, b", "Set Bit in I/O Register"),
    ("sbic", "A, b", "Skip if Bit in I/O Register is Cleared"),
    ("sbis", "A, b", "Skip if Bit in I/O Register is Set"),
    ("sbiw", "Rd, K", "Subtract Immediate from Word"),
    ("sbr", "Rd, K", "Set Bits in Register"),
    ("sbrc", "Rr, b", "Skip if Bit in Register is Cleared"),
    ("sbrs", "Rr, b", "Skip if Bit in Register is Set"),
    ("sec", "", "Set Carry Flag"),
    ("seh", "", "Set Half Carry Flag"),
    ("sei", "", "Set Global Interrupt Enable Bit"),
    ("sen", "", "Set Negative Flag"),
    ("ser", "Rd", "Set all Bits in Register"),
    ("ses", "", "Set Sign Flag"),
    ("set", "", "Set T Flag"),
    ("sev", "", "Set Overflow Flag"),
    ("sez", "", "Set Zero Flag"),
    ("sleep", "", "Sleep"),
    ("spm", "", "Store Program Memory"),
    ("st", "X, Rr", "Store Indirect From Register to Data Space"),
    ("std", "Y+q, Rr", "Store Indirect with Displacement"),
    ("sts", "k, Rr", "Store Direct to Data Space"),
    ("sub", "Rd, Rr", "Subtract without Carry"),
    ("subi", "Rd, K", "Subtract Immediate"),
    ("swap", "Rd", "Swap Nibbles"),
    ("tst", "Rd", "Test for Zero or Minus"),
    ("wdr", "", "Watchdog Reset"),
    ("xch", "Z, Rd", "Exchange"),
];

pub static DIRECTIVES: &[Instruction] = instructions![
    (".byte", "size", "Reserve bytes in SRAM or EEPROM"),
    (".cseg", "", "Select the code segment"),
    (".db", "values", "Define constant bytes"),
    (".dd", "values", "Define constant double words"),
    (".def", "name = register", "Define a symbolic name for a register"),
    (".device", "name", "Define the target device"),
    (".dq", "values", "Define constant quad words"),
    (".dseg", "", "Select the data segment"),
    (".dw", "values", "Define constant words"),
    (".elif", "condition", "Conditional assembly alternative"),
    (".else", "", "Conditional assembly alternative"),
    (".endif", "", "End conditional assembly"),
    (".endm", "", "End macro definition"),
    (".endmacro", "", "End macro definition"),
    (".equ", "name = expression", "Set a symbol equal to an expression"),
    (".error", "\"message\"", "Emit an error"),
    (".eseg", "", "Select the EEPROM segment"),
    (".exit", "", "Stop assembling this file"),
    (".if", "condition", "Conditional assembly"),
    (".ifdef", "symbol", "Assemble if symbol is defined"),
    (".ifndef", "symbol", "Assemble if symbol is not defined"),
    (".include", "\"file\"", "Include another file"),
    (".list", "", "Turn listfile generation on"),
    (".listmac", "", "Turn macro expansion in the listfile on"),
    (".macro", "name", "Begin macro definition"),
    (".message", "\"message\"", "Emit a message"),
    (".nolist", "", "Turn listfile generation off"),
    (".nooverlap", "", "Disable overlap detection"),
    (".org", "address", "Set program origin"),
    (".overlap", "", "Allow overlapping sections"),
    (".set", "name = expression", "Set a symbol equal to an expression, redefinable"),
    (".undef", "name", "Undefine a register symbol"),
    (".warning", "\"message\"", "Emit a warning"),
];

static MNEMONIC_MAP: Lazy<HashMap<&'static str, &'static Instruction>> = Lazy::new(|| {
    INSTRUCTIONS
        .iter()
        .chain(DIRECTIVES.iter())
        .map(|instruction| (instruction.mnemonic, instruction))
        .collect()
});

/// Find an instruction or directive, ignoring case.
pub fn instruction(mnemonic: &str) -> Option<&'static Instruction> {
    MNEMONIC_MAP
        .get(mnemonic.to_ascii_lowercase().as_str())
        .copied()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Register {
    pub name: String,
    pub description: String,
}

const POINTER_ALIASES: [(&str, &str); 9] = [
    ("x", "X pointer (r27:r26)"),
    ("y", "Y pointer (r29:r28)"),
    ("z", "Z pointer (r31:r30)"),
    ("xl", "X pointer low byte (r26)"),
    ("xh", "X pointer high byte (r27)"),
    ("yl", "Y pointer low byte (r28)"),
    ("yh", "Y pointer high byte (r29)"),
    ("zl", "Z pointer low byte (r30)"),
    ("zh", "Z pointer high byte (r31)"),
];

/// `r0`..`r31` followed by the pointer aliases.
pub static REGISTERS: Lazy<Vec<Register>> = Lazy::new(|| {
    (0..32)
        .map(|n| Register {
            name: format!("r{n}"),
            description: match n {
                0..=15 => "General purpose register".to_string(),
                16..=25 => "General purpose register (immediate capable)".to_string(),
                _ => format!(
                    "General purpose register (pointer {})",
                    ["XL", "XH", "YL", "YH", "ZL", "ZH"][n - 26]
                ),
            },
        })
        .chain(POINTER_ALIASES.iter().map(|(name, description)| Register {
            name: name.to_string(),
            description: description.to_string(),
        }))
        .collect()
});

pub fn register(name: &str) -> Option<&'static Register> {
    REGISTERS
        .iter()
        .find(|register| register.name.eq_ignore_ascii_case(name))
}
