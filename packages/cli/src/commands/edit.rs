use super::{open_site, print_applied};
use anyhow::Result;
use clap::{Args, Subcommand};
use ncd_editor::Mutation;
use std::path::Path;

#[derive(Args, Debug)]
pub struct EditArgs {
    /// Component identifier (data-ncd-id)
    pub id: String,

    #[command(subcommand)]
    pub operation: EditOperation,
}

#[derive(Subcommand, Debug)]
pub enum EditOperation {
    /// Replace the element's text
    SetText { text: String },

    /// Set or overwrite an attribute
    SetAttribute { attribute: String, value: String },

    /// Set a property in the component's scoped CSS rule
    SetStyle { property: String, value: String },

    /// Add a class
    AddClass { class_name: String },

    /// Remove a class
    RemoveClass { class_name: String },
}

impl From<EditOperation> for Mutation {
    fn from(operation: EditOperation) -> Self {
        match operation {
            EditOperation::SetText { text } => Mutation::SetText { text },
            EditOperation::SetAttribute { attribute, value } => {
                Mutation::SetAttribute { attribute, value }
            }
            EditOperation::SetStyle { property, value } => {
                Mutation::SetStyleProperty { property, value }
            }
            EditOperation::AddClass { class_name } => Mutation::AddClass { class_name },
            EditOperation::RemoveClass { class_name } => Mutation::RemoveClass { class_name },
        }
    }
}

pub fn edit(args: EditArgs, root: &Path) -> Result<()> {
    let site = open_site(root)?;
    let mutation = Mutation::from(args.operation);
    let applied = site.apply(&args.id, &mutation)?;
    print_applied(&applied);
    Ok(())
}
