use quote::quote;
use synstructure::{Structure, decl_derive};

decl_derive! {
    [WeakSlots, attributes(weak_slot)] =>
    /// Derive the `WeakSlots` trait.
    derive_weak_slots
}

/// Derives the `WeakSlots` trait.
///
/// Every field tagged `#[weak_slot]` is reported to the visitor in
/// declaration order, named after the field (or its binding for tuple
/// structs).
fn derive_weak_slots(mut s: Structure<'_>) -> proc_macro2::TokenStream {
    if let syn::Data::Enum(data) = &s.ast().data {
        return syn::Error::new_spanned(
            data.enum_token,
            "`WeakSlots` can only be derived for structs",
        )
        .into_compile_error();
    }

    s.filter(|bi| {
        bi.ast()
            .attrs
            .iter()
            .any(|attr| attr.path().is_ident("weak_slot"))
    });

    let body = s.each(|bi| {
        let name = bi
            .ast()
            .ident
            .as_ref()
            .map_or_else(|| bi.binding.to_string(), ToString::to_string);
        quote! {
            visitor(
                ::weak_lists::FieldId::new(#name),
                ::weak_lists::WeakSlot::load(#bi),
            );
        }
    });

    s.bound_impl(
        quote!(::weak_lists::WeakSlots),
        quote! {
            fn for_each_weak_slot(
                &self,
                visitor: &mut dyn FnMut(
                    ::weak_lists::FieldId,
                    ::core::option::Option<::weak_lists::ObjectRef>,
                ),
            ) {
                match *self { #body }
            }
        },
    )
}
