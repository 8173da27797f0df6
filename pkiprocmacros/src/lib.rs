//! Procedural macros used to define typed getters and setters for `PolicyProperties` maps

use proc_macro_error::{abort, proc_macro_error};
use quote::quote;
use syn::parse::ParseStream;
use syn::parse::{Parse, Result};
use syn::{Ident, Token};

type ValueName = Ident;
type ValueType = Ident;

/// Signature contains the results of parsing a pp_gets_and_sets definition, i.e., the
/// name of a value stored in a PolicyProperties map and the corresponding type.
struct Signature {
    value_name: ValueName,
    value_type: ValueType,
}

/// Syntax contains the components of a pp_gets_and_sets invocation, i.e., a value name, a comma and
/// a value type. For example:
///     ```ignore
///     pp_gets_and_sets!(PP_CONTINUE_AFTER_FAILURE, bool);
///     ```
struct Syntax {
    value_name: ValueName,
    _comma_token: Token!(,),
    value_type: ValueType,
}

impl Parse for Signature {
    fn parse(stream: ParseStream<'_>) -> Result<Self> {
        let syntax = Syntax {
            value_name: stream.parse()?,
            _comma_token: stream.parse()?,
            value_type: stream.parse()?,
        };

        Ok(Signature {
            value_name: syntax.value_name,
            value_type: syntax.value_type,
        })
    }
}

/// Maps a Rust type name to the name of the `PolicyPropertyTypes` variant that carries it, i.e.,
/// u64 becomes U64 and bool becomes Bool. Other type names are used as is.
fn variant_name(type_name: &str) -> String {
    let numeric_suffix = type_name.len() > 1 && type_name[1..].chars().all(|c| c.is_numeric());
    if numeric_suffix {
        type_name.to_uppercase()
    } else if type_name == "bool" {
        "Bool".to_string()
    } else {
        type_name.to_string()
    }
}

/// `pp_gets_and_sets` generates `get_<name>`, `set_<name>` and `clear_<name>` methods for a
/// `PP_<NAME>` key. It is intended for use inside an `impl PolicyProperties` block. Getters return
/// `None` when the key is absent so that callers can fall through to less specific properties.
#[proc_macro_error]
#[proc_macro]
pub fn pp_gets_and_sets(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let signature = syn::parse_macro_input!(input as Signature);
    let flag = signature.value_name;
    let value_t = signature.value_type;

    let flag_name = flag.to_string();
    let flag_str = match flag_name.strip_prefix("PP_") {
        Some(s) if !s.is_empty() => s.to_lowercase(),
        _ => abort!(flag, "property names must take the form PP_<NAME>"),
    };

    let getter_str = format!("get_{}", flag_str);
    let setter_str = format!("set_{}", flag_str);
    let clear_str = format!("clear_{}", flag_str);
    let getter = syn::Ident::new(&getter_str, flag.span());
    let setter = syn::Ident::new(&setter_str, flag.span());
    let clear = syn::Ident::new(&clear_str, flag.span());
    let variant = syn::Ident::new(&variant_name(&value_t.to_string()), value_t.span());

    let getter_comment = format!(
        "`{}` retrieves the `{}` item from a [`PolicyProperties`] instance, if set",
        getter_str, flag
    );
    let setter_comment = format!(
        "`{}` sets the `{}` item in a [`PolicyProperties`] instance",
        setter_str, flag
    );
    let clear_comment = format!(
        "`{}` removes the `{}` item from a [`PolicyProperties`] instance",
        clear_str, flag
    );

    let tokens = quote! {
        #[doc = #getter_comment]
        pub fn #getter(&self) -> Option<#value_t> {
            match self.0.get(#flag) {
                Some(PolicyPropertyTypes::#variant(v)) => Some(v.clone()),
                _ => None,
            }
        }
        #[doc = #setter_comment]
        pub fn #setter(&mut self, v: #value_t) -> &mut Self {
            self.0.insert(#flag.to_string(), PolicyPropertyTypes::#variant(v));
            self
        }
        #[doc = #clear_comment]
        pub fn #clear(&mut self) -> &mut Self {
            self.0.remove(#flag);
            self
        }
    };
    tokens.into()
}
