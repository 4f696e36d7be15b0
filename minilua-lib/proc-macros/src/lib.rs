use proc_macro::TokenStream;
mod opcode;

/// Used on the OpCode enum.
///
/// A program is a flat sequence of `i64` cells: every instruction is one cell holding the
/// opcode's discriminant, optionally followed by exactly one operand cell. The enum therefore
/// has to be fieldless with an `i64` repr, and variants that take an operand are marked
/// with the `#[operand]` helper attribute.
///
/// This Macro generates the following:
/// * `Self::ALL`, every variant in declaration order
/// * `Self::cell(self) -> i64`, the discriminant as it is stored in a program
/// * `Self::decode(i64) -> Option<Self>`, the inverse of `cell`
/// * `Self::operand_count(self) -> usize`, 0 or 1
/// * `Self::width(self) -> usize`, the number of cells an instruction occupies
#[proc_macro_derive(OpCode, attributes(operand))]
pub fn convert(tokens: TokenStream) -> TokenStream {
    opcode::opcode_impl(tokens)
}
