//! # Formstate Derive Macros
//!
//! This crate provides `#[derive(FormSchema)]`, which generates the form schema of a Rust type
//! at compile time so that a form can be validated against it with `JsonSchema::of`.
//!
//! ### Supported Types
//!
//! - **Structs**: object schemas with one property per field; fields are required unless their
//!   type is optional (`Option<T>`)
//! - **Unit Enums**: string enum schemas listing the variant names
//! - **Complex Enums**: `oneOf` schemas for struct and tuple variants, matching serde's
//!   externally tagged encoding: `{"Variant": {..}}`, `{"Variant": value}` for newtype
//!   variants, and `{"Variant": [..]}` for longer tuples
//!
//! ### Field Constraints
//!
//! Struct fields accept `#[form(...)]` with any of `min_length`, `max_length`, `min`, `max`,
//! `min_items`, `max_items`, `pattern`, and `message`.  They map onto the `minLength`,
//! `maxLength`, `minimum`, `maximum`, `minItems`, `maxItems`, `pattern`, and `errorMessage`
//! keywords of the field's schema.
//!
//! ```ignore
//! use formstate::FormSchema;
//!
//! #[derive(FormSchema)]
//! struct Signup {
//!     #[form(min_length = 1, message = "Name is required")]
//!     name: String,
//!     #[form(min = 18)]
//!     age: u32,
//!     nickname: Option<String>,
//! }
//!
//! let schema = Signup::form_schema();
//! assert_eq!(schema["type"], "object");
//! assert_eq!(schema["properties"]["name"]["minLength"], 1);
//! assert_eq!(schema["properties"]["age"]["minimum"], 18);
//! assert_eq!(schema["required"], serde_json::json!(["name", "age"]));
//! ```

#![recursion_limit = "128"]

extern crate proc_macro;
#[macro_use]
extern crate quote;
extern crate syn;

use proc_macro2::TokenStream;
use syn::{DeriveInput, parse_macro_input};

use derive_util::{EnumVisitor, StructVisitor};

/// Derive the FormSchema trait for structs and enums.
#[proc_macro_derive(FormSchema, attributes(form))]
pub fn derive_form_schema(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let ty_name = input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let schema_gen = match input.data {
        syn::Data::Struct(ref ds) => {
            let mut fsv = FormSchemaStructVisitor;
            let (value, required) = fsv.visit_struct(&ty_name, ds);
            quote! {
                let mut result = serde_json::json!({});
                #[allow(unused_mut)]
                let mut properties = serde_json::json!({});
                #value
                result["required"] = serde_json::Value::Array(vec![]);
                #required
                result["type"] = "object".into();
                result["properties"] = properties;
                result
            }
        }
        syn::Data::Enum(ref de) => {
            let mut fsv = FormSchemaEnumVisitor::new();
            fsv.visit_enum(&ty_name, de)
        }
        syn::Data::Union(ref du) => {
            return syn::Error::new_spanned(du.union_token, "unions are not supported")
                .to_compile_error()
                .into();
        }
    };

    let generated = quote! {
        impl #impl_generics formstate::FormSchema for #ty_name #ty_generics #where_clause {
            fn form_schema() -> serde_json::Value {
                #schema_gen
            }
        }
    };
    generated.into()
}

fn strip_raw(ident: &syn::Ident) -> String {
    let name = ident.to_string();
    match name.strip_prefix("r#") {
        Some(name) => name.to_string(),
        None => name,
    }
}

/// Turns `#[form(key = literal, ...)]` attributes into assignments on a local `schema`.
fn field_constraints(field: &syn::Field) -> TokenStream {
    let mut out = quote! {};
    for attr in field.attrs.iter().filter(|attr| attr.path.is_ident("form")) {
        let list = match attr.parse_meta() {
            Ok(syn::Meta::List(list)) => list,
            Ok(other) => {
                return syn::Error::new_spanned(other, "expected #[form(key = value, ...)]")
                    .to_compile_error();
            }
            Err(err) => return err.to_compile_error(),
        };
        for nested in list.nested.iter() {
            let nv = match nested {
                syn::NestedMeta::Meta(syn::Meta::NameValue(nv)) => nv,
                other => {
                    return syn::Error::new_spanned(other, "expected key = value")
                        .to_compile_error();
                }
            };
            let key = nv.path.get_ident().map(|ident| ident.to_string());
            let keyword = match key.as_deref() {
                Some("min_length") => "minLength",
                Some("max_length") => "maxLength",
                Some("min") => "minimum",
                Some("max") => "maximum",
                Some("min_items") => "minItems",
                Some("max_items") => "maxItems",
                Some("pattern") => "pattern",
                Some("message") => "errorMessage",
                _ => {
                    return syn::Error::new_spanned(&nv.path, "unknown form constraint")
                        .to_compile_error();
                }
            };
            let lit = &nv.lit;
            out = quote! {
                #out
                schema[#keyword] = serde_json::json!(#lit);
            };
        }
    }
    out
}

///////////////////////////////////////// FormSchemaStructVisitor ////////////////////////////////////////

struct FormSchemaStructVisitor;

impl StructVisitor for FormSchemaStructVisitor {
    type Output = (TokenStream, TokenStream);

    fn visit_struct_named_fields(
        &mut self,
        _ty_name: &syn::Ident,
        _ds: &syn::DataStruct,
        fields: &syn::FieldsNamed,
    ) -> Self::Output {
        let mut result = quote! {};
        let mut required = quote! {};
        for field in fields.named.iter() {
            if let Some(field_ident) = &field.ident {
                let field_name = strip_raw(field_ident);
                let field_type = field.ty.clone();
                let constraints = field_constraints(field);
                result = quote! {
                    #result
                    {
                        #[allow(unused_mut)]
                        let mut schema = <#field_type as formstate::FormSchema>::form_schema();
                        #constraints
                        properties[#field_name] = schema;
                    }
                };
                required = quote! {
                    #required
                    if !<#field_type as formstate::FormSchema>::OPTIONAL {
                        if let Some(serde_json::Value::Array(arr)) = result.get_mut("required") {
                            arr.push(#field_name.into())
                        }
                    }
                };
            }
        }
        (result, required)
    }
}

///////////////////////////////////////// FormSchemaEnumVisitor ////////////////////////////////////////

struct FormSchemaEnumVisitor {
    unit_variants: Vec<String>,
    complex_variants: Vec<TokenStream>,
}

impl FormSchemaEnumVisitor {
    fn new() -> Self {
        Self {
            unit_variants: Vec::new(),
            complex_variants: Vec::new(),
        }
    }

    fn generate_final_schema(
        unit_variants: &[String],
        complex_variants: &[TokenStream],
    ) -> TokenStream {
        if complex_variants.is_empty() {
            quote! {
                serde_json::json!({
                    "type": "string",
                    "enum": [#(#unit_variants),*]
                })
            }
        } else if unit_variants.is_empty() {
            quote! {
                {
                    let mut schemas: Vec<serde_json::Value> = vec![];
                    #(schemas.push(#complex_variants);)*
                    if schemas.len() == 1 {
                        schemas.remove(0)
                    } else {
                        serde_json::json!({
                            "oneOf": schemas
                        })
                    }
                }
            }
        } else {
            quote! {
                {
                    let mut schemas: Vec<serde_json::Value> = vec![];
                    schemas.push(serde_json::json!({
                        "type": "string",
                        "enum": [#(#unit_variants),*]
                    }));
                    #(schemas.push(#complex_variants);)*
                    serde_json::json!({
                        "oneOf": schemas
                    })
                }
            }
        }
    }
}

impl EnumVisitor for FormSchemaEnumVisitor {
    type Output = TokenStream;
    type VariantOutput = TokenStream;

    fn combine_variants(
        &mut self,
        _ty_name: &syn::Ident,
        _data_enum: &syn::DataEnum,
        _variants: &[Self::VariantOutput],
    ) -> Self::Output {
        Self::generate_final_schema(&self.unit_variants, &self.complex_variants)
    }

    fn visit_enum_variant_unit(
        &mut self,
        _ty_name: &syn::Ident,
        _data_enum: &syn::DataEnum,
        variant: &syn::Variant,
    ) -> Self::VariantOutput {
        self.unit_variants.push(variant.ident.to_string());
        quote! {}
    }

    fn visit_enum_variant_named_field(
        &mut self,
        _ty_name: &syn::Ident,
        _data_enum: &syn::DataEnum,
        variant: &syn::Variant,
        fields: &syn::FieldsNamed,
    ) -> Self::VariantOutput {
        let variant_name = variant.ident.to_string();

        let mut properties = quote! {};
        let mut required = quote! {};

        for field in fields.named.iter() {
            if let Some(field_ident) = &field.ident {
                let field_name = strip_raw(field_ident);
                let field_type = &field.ty;
                let constraints = field_constraints(field);
                properties = quote! {
                    #properties
                    {
                        #[allow(unused_mut)]
                        let mut schema = <#field_type as formstate::FormSchema>::form_schema();
                        #constraints
                        properties[#field_name] = schema;
                    }
                };
                required = quote! {
                    #required
                    if !<#field_type as formstate::FormSchema>::OPTIONAL {
                        required.push(#field_name.into());
                    }
                };
            }
        }

        let variant_schema = quote! {
            {
                #[allow(unused_mut)]
                let mut properties = serde_json::json!({});
                #[allow(unused_mut)]
                let mut required: Vec<serde_json::Value> = vec![];
                #properties
                #required
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        #variant_name: {
                            "type": "object",
                            "properties": properties,
                            "required": required
                        }
                    },
                    "required": [#variant_name]
                })
            }
        };

        self.complex_variants.push(variant_schema.clone());
        variant_schema
    }

    fn visit_enum_variant_unnamed_field(
        &mut self,
        _ty_name: &syn::Ident,
        _data_enum: &syn::DataEnum,
        variant: &syn::Variant,
        fields: &syn::FieldsUnnamed,
    ) -> Self::VariantOutput {
        let variant_name = variant.ident.to_string();
        let arity = fields.unnamed.len();

        let mut items = quote! {};
        for field in fields.unnamed.iter() {
            let field_type = &field.ty;
            items = quote! {
                #items
                items.push(<#field_type as formstate::FormSchema>::form_schema());
            };
        }

        let variant_schema = quote! {
            {
                let mut items: Vec<serde_json::Value> = vec![];
                #items
                let variant_schema = if items.len() == 1 {
                    items.remove(0)
                } else {
                    serde_json::json!({
                        "type": "array",
                        "items": items,
                        "minItems": #arity,
                        "maxItems": #arity
                    })
                };
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        #variant_name: variant_schema
                    },
                    "required": [#variant_name]
                })
            }
        };

        self.complex_variants.push(variant_schema.clone());
        variant_schema
    }
}
