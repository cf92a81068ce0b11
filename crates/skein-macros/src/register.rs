use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{Ident, ItemFn, LitStr, parse_macro_input};

/// Which link-time registry a factory goes into.
#[derive(Clone, Copy)]
pub enum Registry {
    Define,
    Interceptor,
}

/// Rejects identities that can never name a unit.
fn check_identity(identity: &LitStr) -> syn::Result<()> {
    let value = identity.value();
    let valid = !value.is_empty()
        && !value.starts_with('.')
        && !value.ends_with('.')
        && !value.contains("..")
        && !value.chars().any(|c| c.is_whitespace() || c == '/');
    if valid {
        Ok(())
    } else {
        Err(syn::Error::new(
            identity.span(),
            format!("`{value}` is not a dotted unit name such as `com.acme.ClientDefine`"),
        ))
    }
}

fn static_name(prefix: &str, func: &ItemFn) -> Ident {
    let fn_name_upper = func.sig.ident.to_string().to_uppercase();
    Ident::new(&format!("_SKEIN_{prefix}_{fn_name_upper}"), Span::call_site())
}

/// Implementation of `#[plugin_define("…")]` and `#[interceptor("…")]`.
///
/// Leaves the decorated factory unchanged and appends a
/// `#[::skein_core::linkme::distributed_slice]` static registering it under
/// the given identity.
pub fn register_factory(registry: Registry, attr: TokenStream, item: TokenStream) -> TokenStream {
    let identity = parse_macro_input!(attr as LitStr);
    let func = parse_macro_input!(item as ItemFn);
    if let Err(e) = check_identity(&identity) {
        return e.into_compile_error().into();
    }

    let fn_name = &func.sig.ident;
    let (slice, registration, static_name) = match registry {
        Registry::Define => (
            quote!(::skein_core::PLUGIN_DEFINES),
            quote!(::skein_core::DefineRegistration),
            static_name("DEFINE", &func),
        ),
        Registry::Interceptor => (
            quote!(::skein_core::INTERCEPTORS),
            quote!(::skein_core::InterceptorRegistration),
            static_name("INTERCEPTOR", &func),
        ),
    };

    quote! {
        #func

        #[::skein_core::linkme::distributed_slice(#slice)]
        #[linkme(crate = ::skein_core::linkme)]
        static #static_name: #registration = #registration {
            identity: #identity,
            factory: #fn_name,
        };
    }
    .into()
}

/// Implementation of `#[boot_service(id = "…", default | overrides = "…")]`.
pub fn boot_service(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut id: Option<LitStr> = None;
    let mut is_default = false;
    let mut overrides: Option<LitStr> = None;

    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("id") {
            id = Some(meta.value()?.parse()?);
            Ok(())
        } else if meta.path.is_ident("default") {
            is_default = true;
            Ok(())
        } else if meta.path.is_ident("overrides") {
            overrides = Some(meta.value()?.parse()?);
            Ok(())
        } else {
            Err(meta.error("unknown boot_service option; expected `id`, `default` or `overrides`"))
        }
    });
    parse_macro_input!(attr with parser);
    let func = parse_macro_input!(item as ItemFn);

    let Some(id) = id else {
        return syn::Error::new(Span::call_site(), "boot_service requires `id = \"…\"`")
            .into_compile_error()
            .into();
    };
    if id.value().trim().is_empty() {
        return syn::Error::new(id.span(), "boot service id cannot be empty")
            .into_compile_error()
            .into();
    }

    let kind = match (is_default, overrides) {
        (true, Some(target)) => {
            return syn::Error::new(
                target.span(),
                "a boot service cannot be both `default` and `overrides`",
            )
            .into_compile_error()
            .into();
        }
        (true, None) => quote!(::skein_core::RegistrationKind::Default),
        (false, Some(target)) => quote!(
            ::skein_core::RegistrationKind::Override(::skein_core::ServiceId::from_static(#target))
        ),
        (false, None) => quote!(::skein_core::RegistrationKind::Plain),
    };

    let fn_name = &func.sig.ident;
    let static_name = static_name("SERVICE", &func);

    quote! {
        #func

        #[::skein_core::linkme::distributed_slice(::skein_core::BOOT_SERVICES)]
        #[linkme(crate = ::skein_core::linkme)]
        static #static_name: ::skein_core::ServiceRegistration = ::skein_core::ServiceRegistration {
            identity: ::skein_core::ServiceId::from_static(#id),
            kind: #kind,
            factory: #fn_name,
        };
    }
    .into()
}
