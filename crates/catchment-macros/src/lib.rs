use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DeriveInput, Fields, Lit, Meta};

/// Derive macro that generates a companion struct-of-arrays `*Series` for a
/// flux record. All fields in the source struct must be `f64`.
///
/// The series is used both across cells (one entry per active cell) and
/// across timesteps (one entry per step). It carries the same fields as
/// `Vec<f64>` plus `with_capacity`, `push`, `get`, `column`, `len` and
/// `is_empty`. A `field_names()` associated function is added to the record.
///
/// Use `#[fluxes(series_name = "CustomName")]` to override the default
/// series struct name (`{StructName}Series`).
#[proc_macro_derive(Fluxes, attributes(fluxes))]
pub fn derive_fluxes(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let name = &input.ident;

    let series_name = match extract_series_name(&input) {
        Ok(Some(ident)) => ident,
        Ok(None) => format_ident!("{}Series", name),
        Err(err) => return err.to_compile_error().into(),
    };

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return syn::Error::new_spanned(
                    name,
                    "Fluxes can only be derived for structs with named fields",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(name, "Fluxes can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    if fields.is_empty() {
        return syn::Error::new_spanned(name, "Fluxes struct must have at least one field")
            .to_compile_error()
            .into();
    }

    let mut field_idents = Vec::with_capacity(fields.len());
    for field in fields {
        if !is_f64_type(&field.ty) {
            return syn::Error::new_spanned(&field.ty, "Fluxes derive: all fields must be f64")
                .to_compile_error()
                .into();
        }
        match field.ident.as_ref() {
            Some(ident) => field_idents.push(ident),
            None => {
                return syn::Error::new_spanned(field, "Fluxes derive: unnamed field")
                    .to_compile_error()
                    .into();
            }
        }
    }

    let first_field = field_idents[0];
    let field_name_strs: Vec<String> = field_idents.iter().map(|f| f.to_string()).collect();

    let series_fields = field_idents.iter().map(|f| quote! { pub #f: Vec<f64> });
    let with_cap_fields = field_idents
        .iter()
        .map(|f| quote! { #f: Vec::with_capacity(n) });
    let push_fields = field_idents.iter().map(|f| quote! { self.#f.push(record.#f); });
    let get_fields = field_idents.iter().map(|f| quote! { #f: self.#f[i] });
    let column_arms = field_idents
        .iter()
        .zip(field_name_strs.iter())
        .map(|(f, s)| quote! { #s => Some(self.#f.as_slice()), });

    let expanded = quote! {
        /// Struct-of-arrays companion collecting one record per entry.
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct #series_name {
            #(#series_fields,)*
        }

        impl #series_name {
            /// Pre-allocate all vectors for `n` entries.
            pub fn with_capacity(n: usize) -> Self {
                Self {
                    #(#with_cap_fields,)*
                }
            }

            /// Append one record.
            pub fn push(&mut self, record: &#name) {
                #(#push_fields)*
            }

            /// Reassemble the record stored at index `i`.
            pub fn get(&self, i: usize) -> Option<#name> {
                if i >= self.len() {
                    return None;
                }
                Some(#name {
                    #(#get_fields,)*
                })
            }

            /// Look up a column by field name.
            pub fn column(&self, field: &str) -> Option<&[f64]> {
                match field {
                    #(#column_arms)*
                    _ => None,
                }
            }

            /// Number of entries stored.
            pub fn len(&self) -> usize {
                self.#first_field.len()
            }

            /// Returns `true` if nothing has been stored.
            pub fn is_empty(&self) -> bool {
                self.#first_field.is_empty()
            }
        }

        impl #name {
            /// Returns the field names of this flux record.
            pub fn field_names() -> &'static [&'static str] {
                &[#(#field_name_strs),*]
            }
        }
    };

    expanded.into()
}

fn extract_series_name(input: &DeriveInput) -> syn::Result<Option<proc_macro2::Ident>> {
    for attr in &input.attrs {
        if !attr.path().is_ident("fluxes") {
            continue;
        }
        let nested = attr.parse_args_with(
            syn::punctuated::Punctuated::<Meta, syn::Token![,]>::parse_terminated,
        )?;
        for meta in nested {
            match meta {
                Meta::NameValue(nv) if nv.path.is_ident("series_name") => {
                    if let syn::Expr::Lit(expr_lit) = &nv.value {
                        if let Lit::Str(lit_str) = &expr_lit.lit {
                            return Ok(Some(format_ident!("{}", lit_str.value())));
                        }
                    }
                    return Err(syn::Error::new_spanned(
                        &nv.value,
                        "series_name expects a string literal",
                    ));
                }
                other => {
                    return Err(syn::Error::new_spanned(
                        other,
                        "unknown fluxes attribute, expected `series_name = \"...\"`",
                    ));
                }
            }
        }
    }
    Ok(None)
}

fn is_f64_type(ty: &syn::Type) -> bool {
    if let syn::Type::Path(type_path) = ty {
        type_path.path.is_ident("f64")
    } else {
        false
    }
}
