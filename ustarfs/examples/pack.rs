use std::env;

use ustarfs::{build, Node};

pub fn main() {
    let src = env::args().nth(1).unwrap_or_else(|| ".".to_string());

    let tree = Node::from_path(&src, "root").expect("should load source tree");
    let image = build(&tree).expect("should build");
    let stats = image.reader().unwrap().stats();
    println!("{}: {} sectors used, {} free", src, stats.used, stats.free);
}
