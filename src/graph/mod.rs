pub mod package_graph;

pub use package_graph::PackageGraph;
