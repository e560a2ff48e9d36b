use crate::error::Error;
use j4rs::{
    Instance, InvocationArg, Jvm, JvmBuilder, MavenArtifact, MavenArtifactRepo, MavenSettings,
};
use std::cell::OnceCell;
use std::rc::Rc;
use tracing::{info, warn};

/// Bio-Formats release deployed by the build script and by [`download_bioformats`]
pub const BIOFORMATS_VERSION: &str = "8.3.0";

const OME_RELEASES: &str =
    "openmicroscopy::https://artifacts.openmicroscopy.org/artifactory/ome.releases";

thread_local! {
    static JVM: OnceCell<Rc<Jvm>> = const { OnceCell::new() }
}

/// Ensure 1 jvm per thread
fn jvm() -> Rc<Jvm> {
    JVM.with(|cell| {
        cell.get_or_init(move || Rc::new(JvmBuilder::new().build().expect("Failed to build JVM")))
            .clone()
    })
}

/// Download the Bio-Formats jar (and optionally the GPL licensed readers) into the jassets folder
pub fn download_bioformats(gpl_formats: bool) -> Result<(), Error> {
    let jvm = JvmBuilder::new()
        .skip_setting_native_lib()
        .with_maven_settings(MavenSettings::new(vec![MavenArtifactRepo::from(
            OME_RELEASES,
        )]))
        .build()?;

    info!("deploying ome:bioformats_package:{BIOFORMATS_VERSION}");
    jvm.deploy_artifact(&MavenArtifact::from(
        format!("ome:bioformats_package:{BIOFORMATS_VERSION}").as_str(),
    ))?;

    if gpl_formats {
        info!("deploying ome:formats-gpl:{BIOFORMATS_VERSION}");
        jvm.deploy_artifact(&MavenArtifact::from(
            format!("ome:formats-gpl:{BIOFORMATS_VERSION}").as_str(),
        ))?;
    }

    Ok(())
}

macro_rules! method_return {
    ($R:ty$(|c)?) => { Result<$R, Error> };
    () => { Result<(), Error> };
}

macro_rules! method_arg {
    ($n:tt: $t:ty|p) => {
        InvocationArg::try_from($n)?.into_primitive()?
    };
    ($n:tt: $t:ty|i) => {
        InvocationArg::from($n)
    };
    ($n:tt: $t:ty) => {
        InvocationArg::try_from($n)?
    };
}

macro_rules! method {
    ($name:ident, $method:expr $(,[$($n:tt: $t:ty$(|$p:tt)?),*])? $(=> $tt:ty$(|$c:tt)?)?) => {
        pub(crate) fn $name(&self, $($($n: $t),*)?) -> method_return!($($tt)?) {
            let args: Vec<InvocationArg> = vec![$($( method_arg!($n:$t$(|$p)?) ),*)?];
            let _result = jvm().invoke(&self.0, $method, &args)?;

            macro_rules! method_result {
                ($R:ty|c) => {
                    Ok(jvm().to_rust(_result)?)
                };
                ($R:ty) => {
                    Ok(_result)
                };
                () => {
                    Ok(())
                };
            }

            method_result!($($tt$(|$c)?)?)
        }
    };
}

pub(crate) struct DebugTools;

impl DebugTools {
    pub(crate) fn set_root_level(level: &str) -> Result<(), Error> {
        jvm().invoke_static(
            "loci.common.DebugTools",
            "setRootLevel",
            &[InvocationArg::try_from(level)?],
        )?;
        Ok(())
    }
}

/// splits multi-sample planes into one plane per sample
pub(crate) struct ChannelSeparator(Instance);

impl ChannelSeparator {
    pub(crate) fn new(image_reader: &ImageReader) -> Result<Self, Error> {
        let jvm = jvm();
        let channel_separator = jvm.create_instance(
            "loci.formats.ChannelSeparator",
            &[InvocationArg::from(jvm.clone_instance(&image_reader.0)?)],
        )?;
        Ok(ChannelSeparator(channel_separator))
    }

    pub(crate) fn open_bytes(&self, index: i32) -> Result<Vec<u8>, Error> {
        Ok(self
            .open_bi8(index)?
            .into_iter()
            .map(|b| b as u8)
            .collect())
    }

    method!(open_bi8, "openBytes", [index: i32|p] => Vec<i8>|c);
    method!(get_index, "getIndex", [z: i32|p, c: i32|p, t: i32|p] => i32|c);
}

pub(crate) struct ImageReader(Instance);

impl Drop for ImageReader {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("could not close image reader: {e}");
        }
    }
}

impl ImageReader {
    pub(crate) fn new() -> Result<Self, Error> {
        let reader = jvm().create_instance("loci.formats.ImageReader", InvocationArg::empty())?;
        Ok(ImageReader(reader))
    }

    pub(crate) fn open_bytes(&self, index: i32) -> Result<Vec<u8>, Error> {
        Ok(self
            .open_bi8(index)?
            .into_iter()
            .map(|b| b as u8)
            .collect())
    }

    /// OME-XML of the whole file, all series included
    pub(crate) fn ome_xml(&self) -> Result<String, Error> {
        let mds = self.get_metadata_store()?;
        Ok(jvm()
            .chain(&mds)?
            .cast("loci.formats.ome.OMEPyramidStore")?
            .invoke("dumpXML", &[])?
            .to_rust()?)
    }

    method!(set_metadata_store, "setMetadataStore", [ome_data: Instance|i]);
    method!(get_metadata_store, "getMetadataStore" => Instance);
    method!(set_id, "setId", [id: &str]);
    method!(get_series_count, "getSeriesCount" => i32|c);
    method!(set_series, "setSeries", [series: i32|p]);
    method!(open_bi8, "openBytes", [index: i32|p] => Vec<i8>|c);
    method!(get_size_x, "getSizeX" => i32|c);
    method!(get_size_y, "getSizeY" => i32|c);
    method!(get_size_c, "getSizeC" => i32|c);
    method!(get_size_t, "getSizeT" => i32|c);
    method!(get_size_z, "getSizeZ" => i32|c);
    method!(get_pixel_type, "getPixelType" => i32|c);
    method!(is_little_endian, "isLittleEndian" => bool|c);
    method!(is_rgb, "isRGB" => bool|c);
    method!(is_interleaved, "isInterleaved" => bool|c);
    method!(get_index, "getIndex", [z: i32|p, c: i32|p, t: i32|p] => i32|c);
    method!(get_rgb_channel_count, "getRGBChannelCount" => i32|c);
    method!(is_indexed, "isIndexed" => bool|c);
    method!(close, "close");
}

pub(crate) struct MetadataTools(Instance);

impl MetadataTools {
    pub(crate) fn new() -> Result<Self, Error> {
        let meta_data_tools =
            jvm().create_instance("loci.formats.MetadataTools", InvocationArg::empty())?;
        Ok(MetadataTools(meta_data_tools))
    }

    method!(create_ome_xml_metadata, "createOMEXMLMetadata" => Instance);
}
