use serde_derive::{Serialize, Deserialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, PartialOrd, Eq, Ord)]
pub struct SupportedFont {
    pub family: String,
    pub style: String,
    pub weight: String,
}

fn main() {
    println!("cargo:rerun-if-changed=src/fonts.json");
    let s = include_str!("./src/fonts.json");
    let s = serde_json::from_str::<Vec<SupportedFont>>(&s).unwrap();
    uneval::to_out_dir(&s, "fonts.rs").unwrap();
}
