//! Diagram persistence (Blockly-style XML).
//!
//! ```text
//! <xml xmlns="https://developers.google.com/blockly/xml">
//!   <variables>
//!     <variable id="var-1" type="ord_document">order</variable>
//!   </variables>
//!   <block type="show_message" id="3" x="20" y="20">
//!     <field name="LEVEL">success</field>
//!     <value name="MESSAGE">
//!       <block type="text" id="4">
//!         <field name="TEXT">done</field>
//!       </block>
//!     </value>
//!     <next>...</next>
//!   </block>
//! </xml>
//! ```
//!
//! Writing never fails. Reading fails only on malformed XML; content that
//! does not fit the session is dropped by the `Loader`.

mod codec;
mod xml;

pub use codec::{Loader, BLOCKLY_NAMESPACE};
pub use xml::{parse, Element};

use crate::error::DiagramError;
use crate::graph::BlockGraph;
use crate::registry::BlockRegistry;
use crate::variables::VariableMap;

pub fn write_diagram(graph: &BlockGraph, registry: &BlockRegistry, variables: &VariableMap) -> String {
    let mut out = String::new();
    codec::save(graph, registry, variables).write(&mut out, 0);
    out
}

/// Parse diagram text and check that it is rooted at `<xml>`.
pub fn read_diagram(text: &str) -> Result<Element, DiagramError> {
    let root = parse(text)?;
    if root.name != "xml" {
        return Err(DiagramError::UnexpectedRoot(root.name));
    }
    Ok(root)
}
