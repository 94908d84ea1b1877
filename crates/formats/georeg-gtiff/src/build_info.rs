//! Which optional codec libraries this build carries.

use std::fmt;

/// Optional codec libraries a TIFF writer can be built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CodecLibrary {
    Lzw,
    Deflate,
    Lzma,
    Zstd,
    Jpeg,
    WebP,
    Lerc,
    Jxl,
}

impl CodecLibrary {
    pub const ALL: [CodecLibrary; 8] = [
        Self::Lzw,
        Self::Deflate,
        Self::Lzma,
        Self::Zstd,
        Self::Jpeg,
        Self::WebP,
        Self::Lerc,
        Self::Jxl,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Lzw => "LZW",
            Self::Deflate => "DEFLATE",
            Self::Lzma => "LZMA",
            Self::Zstd => "ZSTD",
            Self::Jpeg => "JPEG",
            Self::WebP => "WebP",
            Self::Lerc => "LERC",
            Self::Jxl => "JPEG-XL",
        }
    }

    /// Cargo feature that pulls the library in.
    #[must_use]
    pub fn feature(self) -> &'static str {
        match self {
            Self::Lzw => "lzw",
            Self::Deflate => "deflate",
            Self::Lzma => "lzma",
            Self::Zstd => "zstd",
            Self::Jpeg => "jpeg",
            Self::WebP => "webp",
            Self::Lerc => "lerc",
            Self::Jxl => "jxl",
        }
    }
}

impl fmt::Display for CodecLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Build-time availability of each optional codec library.
///
/// [`BuildFeatures::compiled`] reflects the Cargo features of this build;
/// other constructors exist so negotiation can be checked against any build
/// profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildFeatures {
    pub lzw: bool,
    pub deflate: bool,
    pub lzma: bool,
    pub zstd: bool,
    pub jpeg: bool,
    pub webp: bool,
    pub lerc: bool,
    pub jxl: bool,
}

impl BuildFeatures {
    /// The libraries compiled into this binary.
    #[must_use]
    pub const fn compiled() -> Self {
        Self {
            lzw: cfg!(feature = "lzw"),
            deflate: cfg!(feature = "deflate"),
            lzma: cfg!(feature = "lzma"),
            zstd: cfg!(feature = "zstd"),
            jpeg: cfg!(feature = "jpeg"),
            webp: cfg!(feature = "webp"),
            lerc: cfg!(feature = "lerc"),
            jxl: cfg!(feature = "jxl"),
        }
    }

    /// Every optional library present.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            lzw: true,
            deflate: true,
            lzma: true,
            zstd: true,
            jpeg: true,
            webp: true,
            lerc: true,
            jxl: true,
        }
    }

    /// No optional library present; only the built-in TIFF codecs remain.
    #[must_use]
    pub const fn minimal() -> Self {
        Self {
            lzw: false,
            deflate: false,
            lzma: false,
            zstd: false,
            jpeg: false,
            webp: false,
            lerc: false,
            jxl: false,
        }
    }

    #[must_use]
    pub fn has(&self, library: CodecLibrary) -> bool {
        match library {
            CodecLibrary::Lzw => self.lzw,
            CodecLibrary::Deflate => self.deflate,
            CodecLibrary::Lzma => self.lzma,
            CodecLibrary::Zstd => self.zstd,
            CodecLibrary::Jpeg => self.jpeg,
            CodecLibrary::WebP => self.webp,
            CodecLibrary::Lerc => self.lerc,
            CodecLibrary::Jxl => self.jxl,
        }
    }

    /// Returns a copy with `library` switched on or off.
    #[must_use]
    pub fn with(mut self, library: CodecLibrary, present: bool) -> Self {
        let slot = match library {
            CodecLibrary::Lzw => &mut self.lzw,
            CodecLibrary::Deflate => &mut self.deflate,
            CodecLibrary::Lzma => &mut self.lzma,
            CodecLibrary::Zstd => &mut self.zstd,
            CodecLibrary::Jpeg => &mut self.jpeg,
            CodecLibrary::WebP => &mut self.webp,
            CodecLibrary::Lerc => &mut self.lerc,
            CodecLibrary::Jxl => &mut self.jxl,
        };
        *slot = present;
        self
    }

    /// Libraries present in this profile.
    #[must_use]
    pub fn available_libraries(&self) -> Vec<CodecLibrary> {
        CodecLibrary::ALL
            .into_iter()
            .filter(|lib| self.has(*lib))
            .collect()
    }
}

impl Default for BuildFeatures {
    fn default() -> Self {
        Self::compiled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_toggles_one_library() {
        let build = BuildFeatures::minimal().with(CodecLibrary::Zstd, true);
        assert!(build.has(CodecLibrary::Zstd));
        assert_eq!(build.available_libraries(), vec![CodecLibrary::Zstd]);
    }

    #[test]
    fn test_all_and_minimal() {
        assert_eq!(BuildFeatures::all().available_libraries().len(), 8);
        assert!(BuildFeatures::minimal().available_libraries().is_empty());
    }

    #[test]
    fn test_compiled_matches_features() {
        let build = BuildFeatures::compiled();
        assert_eq!(build.deflate, cfg!(feature = "deflate"));
        assert_eq!(build.webp, cfg!(feature = "webp"));
    }
}
