//! Entry point: classify an image and open the matching parser.

use tracing::debug;

use crate::config::ParseOptions;
use crate::error::{ImageError, Result};
use crate::formats::detect::{self, ImageClassification};
use crate::formats::elf::ElfImage;
use crate::formats::macho::MachOImage;
use crate::formats::pe::PeImage;
use crate::formats::ParseContext;
use crate::memory::Image;
use crate::reflect::Registry;
use crate::resolver::ModuleResolver;

/// Owns the layout registry and options shared by every image it opens.
///
/// ```no_run
/// use imagelens::{ImageInspector, ImageLayout, MappedFile, ParseOptions, ParsedImage};
///
/// let file = MappedFile::open("/bin/ls", 0).unwrap();
/// let inspector = ImageInspector::new(ParseOptions::default());
/// if let ParsedImage::Elf(elf) = inspector.parse(file.image(ImageLayout::File)).unwrap() {
///     println!("{:?}", elf.needed_libraries());
/// }
/// ```
pub struct ImageInspector {
    registry: Registry,
    options: ParseOptions,
    resolver: Option<Box<dyn ModuleResolver>>,
}

impl ImageInspector {
    pub fn new(options: ParseOptions) -> Self {
        Self {
            registry: Registry::new(),
            options,
            resolver: None,
        }
    }

    /// Resolve imported modules through `resolver`.
    pub fn with_resolver(mut self, resolver: impl ModuleResolver + 'static) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    pub fn classify(&self, image: &Image<'_>) -> ImageClassification {
        detect::classify(image.memory(), image.base())
    }

    fn context<'a>(&'a self, image: Image<'a>) -> ParseContext<'a> {
        let ctx = ParseContext::new(image, &self.registry, &self.options);
        match &self.resolver {
            Some(resolver) => ctx.with_resolver(resolver.as_ref()),
            None => ctx,
        }
    }

    /// Open `image` with the parser its magic selects.
    pub fn parse<'a>(&'a self, image: Image<'a>) -> Result<ParsedImage<'a>> {
        let classification = self.classify(&image);
        let span = crate::image_span!(classification.name(), image.base());
        let _guard = span.enter();

        let ctx = self.context(image);
        let parsed = match classification {
            ImageClassification::Pe => ParsedImage::Pe(PeImage::parse(ctx)?),
            ImageClassification::Elf => ParsedImage::Elf(ElfImage::parse(ctx)?),
            ImageClassification::MachO => ParsedImage::MachO(MachOImage::parse(ctx)?),
            ImageClassification::Unrecognized => return Err(ImageError::UnrecognizedFormat),
        };
        debug!(%classification, "Image parsed");
        Ok(parsed)
    }
}

impl Default for ImageInspector {
    fn default() -> Self {
        Self::new(ParseOptions::default())
    }
}

impl std::fmt::Debug for ImageInspector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageInspector")
            .field("options", &self.options)
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

/// A parsed image of one of the supported formats.
#[derive(Debug)]
pub enum ParsedImage<'a> {
    Pe(PeImage<'a>),
    Elf(ElfImage<'a>),
    MachO(MachOImage<'a>),
}

impl<'a> ParsedImage<'a> {
    pub fn classification(&self) -> ImageClassification {
        match self {
            Self::Pe(_) => ImageClassification::Pe,
            Self::Elf(_) => ImageClassification::Elf,
            Self::MachO(_) => ImageClassification::MachO,
        }
    }

    pub fn image(&self) -> Image<'a> {
        match self {
            Self::Pe(pe) => pe.image(),
            Self::Elf(elf) => elf.image(),
            Self::MachO(macho) => macho.image(),
        }
    }

    /// Entry point in this address space, when the image declares one
    pub fn entry_address(&self) -> Option<u64> {
        match self {
            Self::Pe(pe) => pe.entry_address(),
            Self::Elf(elf) => elf.entry_address(),
            Self::MachO(macho) => macho.entry_address(),
        }
    }

    pub fn as_pe(&self) -> Option<&PeImage<'a>> {
        match self {
            Self::Pe(pe) => Some(pe),
            _ => None,
        }
    }

    pub fn as_elf(&self) -> Option<&ElfImage<'a>> {
        match self {
            Self::Elf(elf) => Some(elf),
            _ => None,
        }
    }

    pub fn as_macho(&self) -> Option<&MachOImage<'a>> {
        match self {
            Self::MachO(macho) => Some(macho),
            _ => None,
        }
    }
}
