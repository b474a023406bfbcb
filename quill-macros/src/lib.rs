use proc_macro::TokenStream;
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Expr, Field, Fields, GenericArgument, Ident, LitInt, LitStr,
    PathArguments, Type, parenthesized, parse_macro_input,
};

#[proc_macro_derive(Model, attributes(quill, field))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match derive_model_impl(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    String,
    Integer,
    Boolean,
    Float,
    Text,
}

impl Kind {
    fn constructor(self) -> proc_macro2::TokenStream {
        match self {
            Kind::String => quote! { quill_core::FieldDescriptor::string() },
            Kind::Integer => quote! { quill_core::FieldDescriptor::integer() },
            Kind::Boolean => quote! { quill_core::FieldDescriptor::boolean() },
            Kind::Float => quote! { quill_core::FieldDescriptor::float() },
            Kind::Text => quote! { quill_core::FieldDescriptor::text() },
        }
    }

    /// Kind implied by the `T` of an `Option<T>` field.
    fn infer(inner: &Type) -> Option<Self> {
        let Type::Path(path) = inner else {
            return None;
        };
        let ident = path.path.segments.last()?.ident.to_string();
        match ident.as_str() {
            "String" => Some(Kind::String),
            "i64" | "i32" => Some(Kind::Integer),
            "bool" => Some(Kind::Boolean),
            "f64" => Some(Kind::Float),
            _ => None,
        }
    }
}

/// One parsed `#[field(...)]` declaration.
struct FieldSpec {
    kind: Option<Kind>,
    ddl: Option<String>,
    primary_key: bool,
    name: Option<String>,
    default: Option<DefaultSpec>,
}

/// `default = expr` is a fixed value, `default_with = path` a producer called per record.
enum DefaultSpec {
    Value(Expr),
    With(syn::Path),
}

fn derive_model_impl(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let struct_name = &input.ident;
    let model_name = struct_name.to_string();
    let table_name =
        quill_str(&input.attrs, "table")?.unwrap_or_else(|| model_name.to_lowercase() + "s");

    let all_fields = if let Data::Struct(data) = &input.data {
        if let Fields::Named(fields) = &data.fields {
            &fields.named
        } else {
            return Err(syn::Error::new_spanned(
                &data.fields,
                "Quill Model only supports structs with named fields",
            ));
        }
    } else {
        return Err(syn::Error::new_spanned(
            input,
            "Quill Model only supports structs",
        ));
    };

    let mut field_names = Vec::new();
    let mut columns = Vec::new();
    let mut idents = Vec::new();
    let mut descriptors = Vec::new();
    let mut primary_keys: Vec<&Field> = Vec::new();

    for field in all_fields {
        if is_ignored(field) {
            continue;
        }
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let inner = option_inner(&field.ty).ok_or_else(|| {
            syn::Error::new_spanned(&field.ty, "Quill Model fields must be `Option<T>`")
        })?;
        let spec = parse_field_spec(field)?;
        let kind = match spec.kind.or_else(|| Kind::infer(inner)) {
            Some(kind) => kind,
            None => {
                return Err(syn::Error::new_spanned(
                    &field.ty,
                    "cannot infer column kind, use #[field(string|integer|boolean|float|text)]",
                ));
            }
        };
        if spec.primary_key {
            if matches!(kind, Kind::Boolean | Kind::Text) {
                return Err(syn::Error::new_spanned(
                    field,
                    "boolean and text fields cannot be the primary key",
                ));
            }
            primary_keys.push(field);
        }

        descriptors.push(descriptor_tokens(kind, &spec));
        field_names.push(ident.to_string());
        columns.push(spec.name.clone().unwrap_or_else(|| ident.to_string()));
        idents.push(ident);
    }

    match primary_keys.as_slice() {
        [] => {
            return Err(syn::Error::new_spanned(
                struct_name,
                format!("primary key not found in `{}`", table_name),
            ));
        }
        [_] => {}
        [_, duplicate, ..] => {
            return Err(syn::Error::new_spanned(
                duplicate,
                format!("duplicate primary key in `{}`", table_name),
            ));
        }
    }

    Ok(quote! {
        impl quill_core::Model for #struct_name {
            fn table_name() -> &'static str {
                #table_name
            }

            fn declared_fields() -> Vec<(&'static str, quill_core::FieldDescriptor)> {
                vec![ #( (#field_names, #descriptors) ),* ]
            }

            fn get(&self, field: &str) -> quill_core::Value {
                match field {
                    #( #columns => quill_core::Value::from(::core::clone::Clone::clone(&self.#idents)), )*
                    _ => quill_core::Value::Null,
                }
            }

            fn set(&mut self, field: &str, value: quill_core::Value) -> quill_core::OrmResult<()> {
                match field {
                    #( #columns => self.#idents = quill_core::FromValue::from_value(value)?, )*
                    other => {
                        return Err(quill_core::OrmError::UnknownField {
                            model: #model_name,
                            field: other.to_string(),
                        });
                    }
                }
                Ok(())
            }
        }
    })
}

fn descriptor_tokens(kind: Kind, spec: &FieldSpec) -> proc_macro2::TokenStream {
    let mut tokens = kind.constructor();
    if let Some(ddl) = &spec.ddl {
        tokens = quote! { #tokens.with_ddl(#ddl) };
    }
    if spec.primary_key {
        tokens = quote! { #tokens.primary_key() };
    }
    if let Some(name) = &spec.name {
        tokens = quote! { #tokens.named(#name) };
    }
    match &spec.default {
        Some(DefaultSpec::With(path)) => {
            tokens = quote! {
                #tokens.default_with(|| quill_core::Value::from(#path()))
            };
        }
        Some(DefaultSpec::Value(expr)) => {
            tokens = quote! { #tokens.default_value(#expr) };
        }
        None => {}
    }
    tokens
}

fn parse_field_spec(field: &Field) -> syn::Result<FieldSpec> {
    let mut spec = FieldSpec {
        kind: None,
        ddl: None,
        primary_key: false,
        name: None,
        default: None,
    };
    for attr in &field.attrs {
        if !attr.path().is_ident("field") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("string") {
                spec.kind = Some(Kind::String);
                if meta.input.peek(syn::token::Paren) {
                    let content;
                    parenthesized!(content in meta.input);
                    let len: LitInt = content.parse()?;
                    spec.ddl = Some(format!("varchar({})", len.base10_parse::<u32>()?));
                }
            } else if meta.path.is_ident("integer") {
                spec.kind = Some(Kind::Integer);
            } else if meta.path.is_ident("boolean") {
                spec.kind = Some(Kind::Boolean);
            } else if meta.path.is_ident("float") {
                spec.kind = Some(Kind::Float);
            } else if meta.path.is_ident("text") {
                spec.kind = Some(Kind::Text);
            } else if meta.path.is_ident("primary_key") {
                spec.primary_key = true;
            } else if meta.path.is_ident("name") {
                spec.name = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("ddl") {
                spec.ddl = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("default") {
                spec.default = Some(DefaultSpec::Value(meta.value()?.parse::<Expr>()?));
            } else if meta.path.is_ident("default_with") {
                spec.default = Some(DefaultSpec::With(meta.value()?.parse::<syn::Path>()?));
            } else {
                return Err(meta.error("unsupported field attribute"));
            }
            Ok(())
        })?;
    }
    Ok(spec)
}

fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

fn is_ignored(field: &Field) -> bool {
    for attr in &field.attrs {
        if attr.path().is_ident("quill")
            && let Ok(meta) = attr.parse_args::<Ident>()
            && meta == "ignore"
        {
            return true;
        }
    }
    false
}

fn quill_str(attrs: &[Attribute], key: &str) -> syn::Result<Option<String>> {
    let mut found = None;
    for attr in attrs {
        if attr.path().is_ident("quill") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident(key) {
                    found = Some(meta.value()?.parse::<LitStr>()?.value());
                } else if meta.input.peek(syn::Token![=]) {
                    // other keys are not ours to validate here
                    meta.value()?.parse::<Expr>()?;
                }
                Ok(())
            })?;
        }
    }
    Ok(found)
}
