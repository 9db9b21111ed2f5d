mod document;

use proc_macro::TokenStream;

/// Derive macro for the `Document` trait.
///
/// # Usage
///
/// ```ignore
/// #[derive(Serialize, Deserialize, Clone, Document)]
/// #[document(collection = "players")]
/// struct Player {
///     #[document(id)]
///     pub player_id: String,
///     pub display_name: String,
/// }
/// ```
///
/// Without `#[document(collection = "...")]` the collection defaults to the
/// snake_case struct name with an `s` suffix. Without `#[document(id)]` the
/// field named `id` is used.
#[proc_macro_derive(Document, attributes(document))]
pub fn derive_document(input: TokenStream) -> TokenStream {
    document::derive_document(input)
}
