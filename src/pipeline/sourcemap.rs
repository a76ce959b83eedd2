//! Sourcemap sidecar carried alongside the stylesheet stream
//!
//! The map starts at grass's CSS output, not at the SCSS source.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parcel_sourcemap::SourceMap;

use crate::error::BuildError;

/// Accumulates the mapping from the current stream contents back to the
/// first mapped source.
///
/// Each CSS transform produces a map from its output to its input; the
/// sidecar chains it onto what it already holds so the final map points
/// through every stage.
pub struct SourceMapSidecar {
    source_name: String,
    project_root: String,
    map: Option<SourceMap>,
}

impl SourceMapSidecar {
    pub fn new(source_name: impl Into<String>, project_root: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            project_root: project_root.into(),
            map: None,
        }
    }

    /// Fresh map for a transform reading `input`
    pub fn begin(&self, input: &str) -> SourceMap {
        let mut map = SourceMap::new(&self.project_root);
        let index = map.add_source(&self.source_name);
        if self.map.is_none() {
            let _ = map.set_source_content(index as usize, input);
        }
        map
    }

    /// Chain the map of the latest transform onto the accumulated one
    pub fn advance(&mut self, mut next: SourceMap) -> Result<(), BuildError> {
        if let Some(previous) = self.map.as_mut() {
            next.extends(previous)
                .map_err(|e| BuildError::SourceMap(format!("{e:?}")))?;
        }
        self.map = Some(next);
        Ok(())
    }

    /// Serialized sourcemap JSON
    pub fn to_json(&mut self) -> Result<Option<String>, BuildError> {
        match self.map.as_mut() {
            Some(map) => map
                .to_json(None)
                .map(Some)
                .map_err(|e| BuildError::SourceMap(format!("{e:?}"))),
            None => Ok(None),
        }
    }

    /// Inline `sourceMappingURL` comment carrying the whole map
    pub fn inline_comment(&mut self) -> Result<Option<String>, BuildError> {
        Ok(self.to_json()?.map(|json| {
            format!(
                "/*# sourceMappingURL=data:application/json;charset=utf8;base64,{} */",
                STANDARD.encode(json)
            )
        }))
    }
}
