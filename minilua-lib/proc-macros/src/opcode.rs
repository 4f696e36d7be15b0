use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, ItemEnum};

pub fn opcode_impl(tokens: TokenStream) -> TokenStream {
    let def = parse_macro_input!(tokens as ItemEnum);
    let enum_name = &def.ident;
    let variant_count = def.variants.len();

    let variant_infos: Vec<_> = def
        .variants
        .iter()
        .map(|v| {
            assert!(
                matches!(v.fields, syn::Fields::Unit),
                "OpCode variants can't carry data, mark them with #[operand] instead"
            );
            (&v.ident, has_operand(v))
        })
        .collect();

    let arms: Vec<_> = variant_infos
        .iter()
        .map(|(var_name, operand)| {
            let count: usize = if *operand { 1 } else { 0 };
            (
                quote! { Self::#var_name, },
                quote! { x if x == Self::#var_name as i64 => Some(Self::#var_name), },
                quote! { Self::#var_name => #count, },
            )
        })
        .collect();

    let (all, decode_arms, count_arms): (TokenStream2, TokenStream2, TokenStream2) =
        itertools::multiunzip(arms);

    quote! {
        impl #enum_name {
            pub const ALL: [Self; #variant_count] = [#all];

            pub fn cell(self) -> i64 {
                self as i64
            }

            pub fn decode(cell: i64) -> Option<Self> {
                match cell {
                    #decode_arms
                    _ => None,
                }
            }

            pub fn operand_count(self) -> usize {
                match self {
                    #count_arms
                }
            }

            pub fn width(self) -> usize {
                1 + self.operand_count()
            }
        }
    }
    .into()
}

fn has_operand(v: &syn::Variant) -> bool {
    v.attrs.iter().any(|a| a.path().is_ident("operand"))
}
