use proc_macro::TokenStream as TokenStream1;
use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, ToTokens};

/// This macro is added before a method of `BookTable` in an impl block. It
/// makes the method first check that the table is exactly in the phase named
/// in the attribute.
///
/// For example, `#[allowed_phase(Building)]` makes a method return
/// `Err(BookError::WrongPhase { .. })` unless the table is still being built.
/// The method must return `Result<_, BookError>`, and both `BuildPhase` and
/// `BookError` must be in scope.
#[proc_macro_attribute]
pub fn allowed_phase(attr: TokenStream1, item: TokenStream1) -> TokenStream1 {
    let mut ast: syn::ImplItemFn =
        syn::parse(item).expect("allowed_phase can only be put on a method");
    let phase: syn::Ident = syn::parse(attr).expect("allowed_phase needs a phase name");
    let function_name = ast.sig.ident.to_string();

    let early_return: syn::Stmt =
        syn::parse2(phase_guard(&phase, &function_name)).expect("Invalid phase guard");
    ast.block.stmts.insert(0, early_return);
    ast.into_token_stream().into()
}

fn phase_guard(phase: &syn::Ident, function_name: &str) -> TokenStream2 {
    let phase_name = phase.to_string();
    quote! {
        if self.phase != BuildPhase::#phase {
            return Err(BookError::WrongPhase {
                operation: #function_name,
                expected: #phase_name,
            });
        }
    }
}
