use j4rs::{JvmBuilder, MavenArtifact, MavenArtifactRepo, MavenSettings, errors::J4RsError};
use retry::{delay, delay::Exponential, retry};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::{env, fs};

const BIOFORMATS_VERSION: &str = "8.3.0";

#[derive(Clone, Debug)]
enum BuildError {
    BioFormatsNotDownloaded,
}

impl Display for BuildError {
    fn fmt(&self, fmt: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(fmt, "Bioformats package not downloaded")
    }
}

impl Error for BuildError {}

fn main() -> Result<(), Box<dyn Error>> {
    println!("cargo::rerun-if-changed=build.rs");

    if env::var("DOCS_RS").is_err() {
        retry(
            Exponential::from_millis(1000).map(delay::jitter).take(4),
            deploy_java_artifacts,
        )?;
        let jar = format!("bioformats_package-{BIOFORMATS_VERSION}.jar");
        if !jassets_path()?.join(jar).exists() {
            Err(BuildError::BioFormatsNotDownloaded)?;
        }
    }

    Ok(())
}

/// walk up from OUT_DIR until a sibling called jassets shows up
fn jassets_path() -> Result<PathBuf, J4RsError> {
    let mut start_path = fs::canonicalize(PathBuf::from(env::var("OUT_DIR")?))?;

    while start_path.pop() {
        for entry in fs::read_dir(&start_path)? {
            let path = entry?.path();
            if path.file_name().map(|x| x == "jassets").unwrap_or(false) {
                return Ok(path);
            }
        }
    }

    Err(J4RsError::GeneralError(
        "Can not find jassets directory".to_owned(),
    ))
}

fn deploy_java_artifacts() -> Result<(), J4RsError> {
    let jvm = JvmBuilder::new()
        .skip_setting_native_lib()
        .with_maven_settings(MavenSettings::new(vec![MavenArtifactRepo::from(
            "openmicroscopy::https://artifacts.openmicroscopy.org/artifactory/ome.releases",
        )]))
        .build()?;

    jvm.deploy_artifact(&MavenArtifact::from(
        format!("ome:bioformats_package:{BIOFORMATS_VERSION}").as_str(),
    ))?;

    #[cfg(feature = "gpl-formats")]
    jvm.deploy_artifact(&MavenArtifact::from(
        format!("ome:formats-gpl:{BIOFORMATS_VERSION}").as_str(),
    ))?;

    Ok(())
}
