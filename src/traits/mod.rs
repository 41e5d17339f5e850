pub mod exit_hook;
pub mod recipe;

pub use exit_hook::ExitHook;
pub use recipe::{recipe_fn, FnRecipe, Recipe, RecipeFuture};
