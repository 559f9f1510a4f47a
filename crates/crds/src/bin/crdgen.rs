//! Prints the XCluster and XFirewall CRDs as a multi-document YAML stream.
//!
//! ```sh
//! cargo run -p crds --bin crdgen | kubectl apply -f -
//! ```

use crds::{XCluster, XFirewall};
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let documents = [
        serde_yaml::to_string(&XCluster::crd())?,
        serde_yaml::to_string(&XFirewall::crd())?,
    ];
    print!("{}", documents.join("---\n"));
    Ok(())
}
