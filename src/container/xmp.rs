//! XMP packets for the gain-map metadata descriptor.
//!
//! The primary image carries a container-directory packet naming the
//! embedded items; the gain-map image carries the `hdrgm` packet with the
//! actual metadata. Content boosts and HDR capacities are stored log2, as
//! the Adobe hdrgm namespace prescribes.

use crate::types::GainMapMetadata;

/// Adobe HDR gain-map namespace.
pub const HDRGM_NAMESPACE: &str = "http://ns.adobe.com/hdr-gain-map/1.0/";

/// Google photos container namespace.
pub const CONTAINER_NAMESPACE: &str = "http://ns.google.com/photos/1.0/container/";

/// Google photos container item namespace.
pub const ITEM_NAMESPACE: &str = "http://ns.google.com/photos/1.0/container/item/";

/// Container-directory packet for the primary image.
pub fn generate_container_xmp(gainmap_length: usize) -> String {
    format!(
        r#"<?xpacket begin="" id="W5M0MpCehiHzreSzNTczkc9d"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/" x:xmptk="Adobe XMP Core">
  <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
    <rdf:Description rdf:about=""
        xmlns:hdrgm="{HDRGM_NAMESPACE}"
        xmlns:Container="{CONTAINER_NAMESPACE}"
        xmlns:Item="{ITEM_NAMESPACE}"
        hdrgm:Version="1.0">
      <Container:Directory>
        <rdf:Seq>
          <rdf:li rdf:parseType="Resource">
            <Container:Item
                Item:Semantic="Primary"
                Item:Mime="image/jpeg"/>
          </rdf:li>
          <rdf:li rdf:parseType="Resource">
            <Container:Item
                Item:Semantic="GainMap"
                Item:Mime="image/jpeg"
                Item:Length="{gainmap_length}"/>
          </rdf:li>
        </rdf:Seq>
      </Container:Directory>
    </rdf:Description>
  </rdf:RDF>
</x:xmpmeta>
<?xpacket end="w"?>"#
    )
}

/// hdrgm packet for the gain-map image.
pub fn generate_gainmap_xmp(metadata: &GainMapMetadata) -> String {
    format!(
        r#"<?xpacket begin="" id="W5M0MpCehiHzreSzNTczkc9d"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/" x:xmptk="Adobe XMP Core">
  <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
    <rdf:Description rdf:about=""
        xmlns:hdrgm="{HDRGM_NAMESPACE}"
        hdrgm:Version="1.0"
        hdrgm:GainMapMin="{gain_map_min:.6}"
        hdrgm:GainMapMax="{gain_map_max:.6}"
        hdrgm:Gamma="{gamma:.6}"
        hdrgm:OffsetSDR="{offset_sdr:.6}"
        hdrgm:OffsetHDR="{offset_hdr:.6}"
        hdrgm:HDRCapacityMin="{capacity_min:.6}"
        hdrgm:HDRCapacityMax="{capacity_max:.6}"
        hdrgm:BaseRenditionIsHDR="False"/>
  </rdf:RDF>
</x:xmpmeta>
<?xpacket end="w"?>"#,
        gain_map_min = metadata.min_content_boost.log2(),
        gain_map_max = metadata.max_content_boost.log2(),
        gamma = metadata.gamma,
        offset_sdr = metadata.offset_sdr,
        offset_hdr = metadata.offset_hdr,
        capacity_min = metadata.hdr_capacity_min.log2(),
        capacity_max = metadata.hdr_capacity_max.log2(),
    )
}

/// Parse the gain-map metadata out of an hdrgm XMP packet.
///
/// Returns `None` when the packet does not carry hdrgm metadata. Attributes
/// that are present override the descriptor defaults; multi-channel values
/// collapse to their first channel.
pub fn parse_gainmap_xmp(xmp: &str) -> Option<GainMapMetadata> {
    if !xmp.contains("hdrgm:Version") && !xmp.contains("hdrgm:GainMapMax") {
        return None;
    }

    let mut metadata = GainMapMetadata::default();
    if let Some(v) = extract_number(xmp, "hdrgm:GainMapMin") {
        metadata.min_content_boost = 2.0f32.powf(v);
    }
    if let Some(v) = extract_number(xmp, "hdrgm:GainMapMax") {
        metadata.max_content_boost = 2.0f32.powf(v);
    }
    if let Some(v) = extract_number(xmp, "hdrgm:Gamma") {
        metadata.gamma = v;
    }
    if let Some(v) = extract_number(xmp, "hdrgm:OffsetSDR") {
        metadata.offset_sdr = v;
    }
    if let Some(v) = extract_number(xmp, "hdrgm:OffsetHDR") {
        metadata.offset_hdr = v;
    }
    if let Some(v) = extract_number(xmp, "hdrgm:HDRCapacityMin") {
        metadata.hdr_capacity_min = 2.0f32.powf(v);
    }
    if let Some(v) = extract_number(xmp, "hdrgm:HDRCapacityMax") {
        metadata.hdr_capacity_max = 2.0f32.powf(v);
    }

    Some(metadata)
}

/// Pull an attribute value with plain string matching; full XML parsing is
/// not warranted for the fixed packets the encoders emit.
fn extract_attribute<'a>(xmp: &'a str, name: &str) -> Option<&'a str> {
    let pattern = format!("{name}=\"");
    let start = xmp.find(&pattern)? + pattern.len();
    let end = xmp[start..].find('"')?;
    Some(&xmp[start..start + end])
}

fn extract_number(xmp: &str, name: &str) -> Option<f32> {
    let value = extract_attribute(xmp, name)?;
    // Per-channel values are comma separated; take the first channel.
    value.split(',').next()?.trim().parse::<f32>().ok()
}
