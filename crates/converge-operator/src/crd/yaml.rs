use std::io::Write;

use kube::CustomResourceExt;
use snafu::{ResultExt, Snafu};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to serialize the {crd_name} CustomResourceDefinition"))]
    Serialize {
        source: serde_yaml::Error,
        crd_name: &'static str,
    },

    #[snafu(display("failed to write the CustomResourceDefinition"))]
    Write { source: std::io::Error },
}

/// Renders the `CustomResourceDefinition` of `K` as a single YAML document starting with `---`.
pub fn crd_document<K: CustomResourceExt>() -> Result<String> {
    let body = serde_yaml::to_string(&K::crd()).context(SerializeSnafu {
        crd_name: K::crd_name(),
    })?;
    Ok(format!("---\n{body}"))
}

pub fn write_crd<K: CustomResourceExt>(mut writer: impl Write) -> Result<()> {
    let document = crd_document::<K>()?;
    writer.write_all(document.as_bytes()).context(WriteSnafu)
}
