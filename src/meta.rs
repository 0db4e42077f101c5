//! Image descriptors built from the LIF metadata tree

use crate::error::{LifError, Result};
use crate::xml::XmlElement;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Recursion limit for the metadata tree walk; a deeper tree is rejected as
/// malformed instead of risking the call stack.
const MAX_TREE_DEPTH: usize = 64;

/// Micrometers per meter, for converting the header's physical lengths
const MICROMETERS_PER_METER: f64 = 1e6;

/// Image axes in canonical order: C, Z, T, M, Y, X.
///
/// Every 6-element tuple on [`ImageDescriptor`] (dims, strides, scale) uses
/// this one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Channel
    Channel = 0,
    /// Depth (Z)
    Z = 1,
    /// Time (T)
    T = 2,
    /// Tile / mosaic position (M)
    Tile = 3,
    /// Height (Y)
    Y = 4,
    /// Width (X)
    X = 5,
}

impl Axis {
    /// Position of this axis in the canonical 6-element tuples
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Numeric `DimID` used by `DimensionDescription` elements; the channel
    /// axis has no dimension descriptor.
    pub(crate) fn dim_id(&self) -> Option<u32> {
        match self {
            Axis::Channel => None,
            Axis::Z => Some(3),
            Axis::T => Some(4),
            Axis::Tile => Some(10),
            Axis::Y => Some(2),
            Axis::X => Some(1),
        }
    }

    /// Short lowercase label used in error messages
    pub fn label(&self) -> &'static str {
        match self {
            Axis::Channel => "c",
            Axis::Z => "z",
            Axis::T => "t",
            Axis::Tile => "m",
            Axis::Y => "y",
            Axis::X => "x",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One channel of an image as declared by a `ChannelDescription` element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    /// Byte increment between consecutive samples of this channel
    pub bytes_inc: u64,
    /// Bit depth of one sample; validated to be a whole number of bytes
    pub resolution: u32,
}

impl ChannelDescriptor {
    /// Sample width in bytes
    pub fn byte_depth(&self) -> usize {
        (self.resolution / 8) as usize
    }
}

/// Immutable description of one image in the container.
///
/// Built once per leaf node of the metadata tree, in traversal order; that
/// order is the canonical image index used to pair descriptors with the
/// data blocks discovered by the scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageDescriptor {
    /// Hierarchical folder path, `/`-separated and `/`-terminated
    pub path: String,
    /// Display name of the image node
    pub name: String,
    /// Channel declarations in document order
    pub channels: Vec<ChannelDescriptor>,
    /// Element counts per axis, in C,Z,T,M,Y,X order
    pub dims: [usize; 6],
    /// Byte strides per axis, in C,Z,T,M,Y,X order
    pub strides: [u64; 6],
    /// Physical scale factors per axis, in C,Z,T,M,Y,X order.
    ///
    /// Z, Y, X are samples per micrometer (Y and X use a `count - 1`
    /// numerator); T is frames per time unit as given; C and M are fixed at 1.
    pub scale: [f64; 6],
    /// Physical tile positions in micrometers, one `(x, y)` pair per tile
    /// attachment. Independent of the tile axis size.
    pub tile_positions: Vec<(f64, f64)>,
}

impl ImageDescriptor {
    /// Number of channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Element count along one axis
    pub fn dim(&self, axis: Axis) -> usize {
        self.dims[axis.index()]
    }

    /// Byte stride along one axis
    pub fn stride(&self, axis: Axis) -> u64 {
        self.strides[axis.index()]
    }

    /// Image width in pixels
    pub fn width(&self) -> usize {
        self.dims[Axis::X.index()]
    }

    /// Image height in pixels
    pub fn height(&self) -> usize {
        self.dims[Axis::Y.index()]
    }

    /// Pixel byte depth used for every read; all channels of one image share
    /// the first channel's declared resolution.
    pub fn byte_depth(&self) -> usize {
        self.channels[0].byte_depth()
    }

    /// Pixels in one 2-D plane
    pub fn plane_len(&self) -> usize {
        self.height() * self.width()
    }

    /// Bytes in one 2-D plane
    pub fn plane_bytes(&self) -> usize {
        self.plane_len() * self.byte_depth()
    }

    /// Total number of 2-D planes in the block (channels x z x t x tiles)
    pub fn frame_count(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2] * self.dims[3]
    }
}

/// Walk the metadata tree and build one descriptor per leaf image node,
/// in traversal order.
pub fn find_images(root: &XmlElement) -> Result<Vec<ImageDescriptor>> {
    let mut images = Vec::new();
    walk(root, "", 0, &mut images)?;
    Ok(images)
}

fn walk(
    node: &XmlElement,
    path: &str,
    depth: usize,
    images: &mut Vec<ImageDescriptor>,
) -> Result<()> {
    if depth > MAX_TREE_DEPTH {
        return Err(LifError::InvalidFormat(format!(
            "metadata tree exceeds maximum depth of {MAX_TREE_DEPTH}"
        )));
    }

    // The outer wrapper has its Element children directly on the root; every
    // nested level wraps them in a Children element.
    let mut children: Vec<&XmlElement> = node
        .child("Children")
        .map(|c| c.children_named("Element").collect())
        .unwrap_or_default();
    if children.is_empty() {
        children = node.children_named("Element").collect();
    }

    for item in children {
        let name = item.attr("Name").ok_or_else(|| {
            LifError::InvalidFormat("Element node is missing its Name attribute".to_string())
        })?;
        let appended_path = if path.is_empty() {
            name.to_string()
        } else {
            format!("{path}/{name}")
        };

        let has_sub_children = item
            .child("Children")
            .is_some_and(|c| c.children_named("Element").next().is_some());
        let is_image = item
            .find_path(&["Data", "Image", "ImageDescription", "Dimensions"])
            .is_some();

        if has_sub_children {
            walk(item, &appended_path, depth + 1, images)?;
        } else if is_image {
            images.push(build_descriptor(item, path, name)?);
        }
    }

    Ok(())
}

/// Build the descriptor for one leaf image node
fn build_descriptor(item: &XmlElement, path: &str, name: &str) -> Result<ImageDescriptor> {
    let description = item
        .find_path(&["Data", "Image", "ImageDescription"])
        .ok_or_else(|| {
            LifError::InvalidFormat(format!("image '{name}' has no ImageDescription"))
        })?;

    let mut channels = Vec::new();
    if let Some(channels_el) = description.child("Channels") {
        for channel in channels_el.children_named("ChannelDescription") {
            let bytes_inc = required_attr::<u64>(channel, "BytesInc", name)?;
            let resolution = required_attr::<u32>(channel, "Resolution", name)?;
            if resolution % 8 != 0 {
                return Err(LifError::InvalidFormat(format!(
                    "image '{name}' declares a {resolution}-bit channel; \
                     fractional byte depths are unsupported"
                )));
            }
            channels.push(ChannelDescriptor {
                bytes_inc,
                resolution,
            });
        }
    }
    if channels.is_empty() {
        return Err(LifError::InvalidFormat(format!(
            "image '{name}' has no channel descriptions"
        )));
    }

    let mut dims = [1usize; 6];
    let mut strides = [0u64; 6];
    let mut lengths = [1.0f64; 6];

    dims[0] = channels.len();
    // The channel stride is seeded from the second channel's byte increment;
    // a single-channel image has no second channel and degenerates to 0.
    strides[0] = if channels.len() > 1 {
        channels[1].bytes_inc
    } else {
        0
    };

    let dimensions = description.child("Dimensions").ok_or_else(|| {
        LifError::InvalidFormat(format!("image '{name}' has no Dimensions element"))
    })?;
    for axis in [Axis::Z, Axis::T, Axis::Tile, Axis::Y, Axis::X] {
        let slot = axis.index();
        let dim_id = axis.dim_id().unwrap_or_default().to_string();
        match dimensions
            .children_named("DimensionDescription")
            .find(|d| d.attr("DimID") == Some(dim_id.as_str()))
        {
            Some(dd) => {
                dims[slot] = required_attr::<usize>(dd, "NumberOfElements", name)?;
                strides[slot] = required_attr::<u64>(dd, "BytesInc", name)?;
                lengths[slot] = required_attr::<f64>(dd, "Length", name)?;
            }
            // Absent axis degenerates to a singleton
            None => {
                dims[slot] = 1;
                strides[slot] = 0;
                lengths[slot] = 1.0;
            }
        }
    }

    let scale = [
        1.0,
        dims[1] as f64 / (lengths[1] * MICROMETERS_PER_METER),
        dims[2] as f64 / lengths[2],
        1.0,
        dims[4].saturating_sub(1) as f64 / (lengths[4] * MICROMETERS_PER_METER),
        dims[5].saturating_sub(1) as f64 / (lengths[5] * MICROMETERS_PER_METER),
    ];

    let mut tile_positions = Vec::new();
    if let Some(image_el) = item.find_path(&["Data", "Image"]) {
        for attachment in image_el.children_named("Attachment") {
            for tile in attachment.children_named("Tile") {
                let pos_x = required_attr::<f64>(tile, "PosX", name)? * MICROMETERS_PER_METER;
                let pos_y = required_attr::<f64>(tile, "PosY", name)? * MICROMETERS_PER_METER;
                tile_positions.push((pos_x, pos_y));
            }
        }
    }

    Ok(ImageDescriptor {
        path: format!("{path}/"),
        name: name.to_string(),
        channels,
        dims,
        strides,
        scale,
        tile_positions,
    })
}

fn required_attr<T>(element: &XmlElement, attr: &str, image: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let value = element.attr(attr).ok_or_else(|| {
        LifError::InvalidFormat(format!(
            "image '{image}': {} element is missing its {attr} attribute",
            element.name
        ))
    })?;
    value.parse::<T>().map_err(|e| {
        LifError::InvalidFormat(format!(
            "image '{image}': cannot parse {attr}=\"{value}\": {e}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_document;

    fn image_xml(channels: &str, dimensions: &str, attachments: &str) -> String {
        format!(
            r#"<LMSDataContainerHeader Version="2">
                 <Element Name="demo.lif">
                   <Children>
                     <Element Name="Series_1">
                       <Data>
                         <Image>
                           <ImageDescription>
                             <Channels>{channels}</Channels>
                             <Dimensions>{dimensions}</Dimensions>
                           </ImageDescription>
                           {attachments}
                         </Image>
                       </Data>
                     </Element>
                   </Children>
                 </Element>
               </LMSDataContainerHeader>"#
        )
    }

    fn find(doc: &str) -> Result<Vec<ImageDescriptor>> {
        find_images(&parse_document(doc).unwrap())
    }

    #[test]
    fn test_descriptor_from_full_tree() {
        let doc = image_xml(
            r#"<ChannelDescription BytesInc="0" Resolution="16"/>
               <ChannelDescription BytesInc="524288" Resolution="16"/>"#,
            r#"<DimensionDescription DimID="1" NumberOfElements="512" BytesInc="2" Length="2.5e-04"/>
               <DimensionDescription DimID="2" NumberOfElements="512" BytesInc="1024" Length="2.5e-04"/>
               <DimensionDescription DimID="3" NumberOfElements="10" BytesInc="1048576" Length="9e-06"/>"#,
            "",
        );
        let images = find(&doc).unwrap();
        assert_eq!(images.len(), 1);

        let image = &images[0];
        assert_eq!(image.name, "Series_1");
        assert_eq!(image.path, "demo.lif/");
        assert_eq!(image.channel_count(), 2);
        assert_eq!(image.byte_depth(), 2);
        // C,Z,T,M,Y,X
        assert_eq!(image.dims, [2, 10, 1, 1, 512, 512]);
        assert_eq!(image.strides, [524288, 1048576, 0, 0, 1024, 2]);
        // Z scale: 10 elements over 9 um
        assert!((image.scale[Axis::Z.index()] - 10.0 / 9.0).abs() < 1e-9);
        // X/Y scale uses count - 1
        assert!((image.scale[Axis::X.index()] - 511.0 / 250.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_axes_default_to_singletons() {
        let doc = image_xml(
            r#"<ChannelDescription BytesInc="0" Resolution="8"/>"#,
            r#"<DimensionDescription DimID="1" NumberOfElements="64" BytesInc="1" Length="1e-05"/>
               <DimensionDescription DimID="2" NumberOfElements="32" BytesInc="64" Length="1e-05"/>"#,
            "",
        );
        let image = &find(&doc).unwrap()[0];
        assert_eq!(image.dims, [1, 1, 1, 1, 32, 64]);
        assert_eq!(image.stride(Axis::Z), 0);
        assert_eq!(image.stride(Axis::Tile), 0);
        // Single channel: the channel stride degenerates instead of indexing
        // a second channel that does not exist
        assert_eq!(image.stride(Axis::Channel), 0);
    }

    #[test]
    fn test_fractional_resolution_rejected() {
        let doc = image_xml(
            r#"<ChannelDescription BytesInc="0" Resolution="12"/>"#,
            r#"<DimensionDescription DimID="1" NumberOfElements="8" BytesInc="1" Length="1e-06"/>"#,
            "",
        );
        assert!(matches!(find(&doc), Err(LifError::InvalidFormat(_))));
    }

    #[test]
    fn test_missing_channel_attribute_is_fatal() {
        let doc = image_xml(
            r#"<ChannelDescription Resolution="8"/>"#,
            r#"<DimensionDescription DimID="1" NumberOfElements="8" BytesInc="1" Length="1e-06"/>"#,
            "",
        );
        assert!(matches!(find(&doc), Err(LifError::InvalidFormat(_))));
    }

    #[test]
    fn test_tile_positions_converted_to_micrometers() {
        let doc = image_xml(
            r#"<ChannelDescription BytesInc="0" Resolution="8"/>"#,
            r#"<DimensionDescription DimID="1" NumberOfElements="8" BytesInc="1" Length="1e-06"/>"#,
            r#"<Attachment Name="TileScanInfo">
                 <Tile PosX="1e-03" PosY="2e-03"/>
                 <Tile PosX="3e-03" PosY="4e-03"/>
               </Attachment>"#,
        );
        let image = &find(&doc).unwrap()[0];
        assert_eq!(image.tile_positions, vec![(1000.0, 2000.0), (3000.0, 4000.0)]);
        // The attachment list is independent of the tile axis size
        assert_eq!(image.dim(Axis::Tile), 1);
    }

    #[test]
    fn test_excessively_deep_tree_rejected() {
        // Folder nesting past the recursion cap fails cleanly instead of
        // exhausting the call stack
        let mut doc = String::from("<LMSDataContainerHeader>");
        for i in 0..MAX_TREE_DEPTH + 8 {
            doc.push_str(&format!(r#"<Element Name="folder_{i}"><Children>"#));
        }
        doc.push_str(
            r#"<Element Name="img">
                 <Data><Image><ImageDescription>
                   <Channels><ChannelDescription BytesInc="0" Resolution="8"/></Channels>
                   <Dimensions><DimensionDescription DimID="1" NumberOfElements="4" BytesInc="1" Length="1e-06"/></Dimensions>
                 </ImageDescription></Image></Data>
               </Element>"#,
        );
        for _ in 0..MAX_TREE_DEPTH + 8 {
            doc.push_str("</Children></Element>");
        }
        doc.push_str("</LMSDataContainerHeader>");

        assert!(matches!(find(&doc), Err(LifError::InvalidFormat(_))));
    }

    #[test]
    fn test_folder_nesting_builds_paths_in_order() {
        let doc = r#"<LMSDataContainerHeader>
             <Element Name="root.lif">
               <Children>
                 <Element Name="FolderA">
                   <Children>
                     <Element Name="img1">
                       <Data><Image><ImageDescription>
                         <Channels><ChannelDescription BytesInc="0" Resolution="8"/></Channels>
                         <Dimensions><DimensionDescription DimID="1" NumberOfElements="4" BytesInc="1" Length="1e-06"/></Dimensions>
                       </ImageDescription></Image></Data>
                     </Element>
                   </Children>
                 </Element>
                 <Element Name="img2">
                   <Data><Image><ImageDescription>
                     <Channels><ChannelDescription BytesInc="0" Resolution="8"/></Channels>
                     <Dimensions><DimensionDescription DimID="1" NumberOfElements="4" BytesInc="1" Length="1e-06"/></Dimensions>
                   </ImageDescription></Image></Data>
                 </Element>
               </Children>
             </Element>
           </LMSDataContainerHeader>"#;
        let images = find(doc).unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].name, "img1");
        assert_eq!(images[0].path, "root.lif/FolderA/");
        assert_eq!(images[1].name, "img2");
        assert_eq!(images[1].path, "root.lif/");
    }
}
