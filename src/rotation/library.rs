//! Ability icon templates.
//!
//! The library is built once per engine from the resolved keybindings and the
//! icon images found on disk, and is read-only afterwards.

use anyhow::{bail, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::capture::{bgr_from_dynamic, BgrImage};
use crate::rotation::bindings::AbilityBinding;
use crate::rotation::input::KeyCombo;

/// File extensions accepted as ability icons.
const SUPPORTED_EXTENSIONS: [&str; 4] = ["tga", "png", "jpg", "jpeg"];

/// One ability's reference icon and match settings.
#[derive(Clone, Debug)]
pub struct Template {
    pub name: String,
    pub image: BgrImage,
    pub threshold: f32,
    pub bound_key: Option<KeyCombo>,
}

/// Ordered, name-unique set of templates.
///
/// Iteration order is insertion order, which also decides exact score ties.
#[derive(Clone, Debug, Default)]
pub struct TemplateLibrary {
    templates: Vec<Template>,
}

impl TemplateLibrary {
    /// Builds the library, rejecting duplicate names and empty images.
    pub fn new(templates: Vec<Template>) -> Result<Self> {
        let mut seen = HashSet::new();
        for template in &templates {
            if !seen.insert(template.name.as_str()) {
                bail!("Duplicate template name '{}'", template.name);
            }
            if template.image.width() == 0 || template.image.height() == 0 {
                bail!("Template '{}' has an empty image", template.name);
            }
            if !(0.0..=1.0).contains(&template.threshold) {
                bail!(
                    "Template '{}' threshold {} is outside [0, 1]",
                    template.name,
                    template.threshold
                );
            }
        }
        Ok(Self { templates })
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.name == name)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Builds a library from keybindings and loaded icons, in keybinding order.
///
/// Bound abilities without an icon are logged and left out.
pub fn build_library(
    bindings: &[AbilityBinding],
    mut icons: Vec<(String, BgrImage)>,
) -> Result<TemplateLibrary> {
    let mut templates = Vec::with_capacity(bindings.len());
    for binding in bindings {
        let Some(index) = icons.iter().position(|(name, _)| *name == binding.name) else {
            crate::log(&format!("No icon found for ability '{}'", binding.name));
            continue;
        };
        let (name, image) = icons.swap_remove(index);
        templates.push(Template {
            name,
            image,
            threshold: binding.threshold,
            bound_key: binding.key.clone(),
        });
    }
    TemplateLibrary::new(templates)
}

/// Loads icons for `abilities` from `dirs`.
///
/// Directories are read in order; an icon in a later directory replaces one
/// with the same name from an earlier directory. Unreadable files are skipped.
pub fn load_icons(dirs: &[PathBuf], abilities: &[&str]) -> Vec<(String, BgrImage)> {
    let mut icons: Vec<(String, BgrImage)> = Vec::new();

    for dir in dirs {
        if !dir.is_dir() {
            crate::log(&format!("Icon directory does not exist: {}", dir.display()));
            continue;
        }
        for (name, image) in load_icons_from_directory(dir, abilities) {
            match icons.iter_mut().find(|(existing, _)| *existing == name) {
                Some(slot) => slot.1 = image,
                None => icons.push((name, image)),
            }
        }
    }

    crate::log(&format!(
        "Loaded icons: {:?}",
        icons.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>()
    ));
    icons
}

fn load_icons_from_directory(dir: &Path, abilities: &[&str]) -> Vec<(String, BgrImage)> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            crate::log(&format!("Failed to list {}: {}", dir.display(), e));
            return Vec::new();
        }
    };

    let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    paths.sort();

    let mut icons = Vec::new();
    for path in paths {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()));
        if !supported || !abilities.contains(&stem) {
            continue;
        }

        match image::open(&path) {
            Ok(img) => icons.push((stem.to_string(), bgr_from_dynamic(&img))),
            Err(e) => crate::log(&format!(
                "Failed to load image: {}, error: {}",
                path.display(),
                e
            )),
        }
    }
    icons
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use tempfile::tempdir;

    fn template(name: &str, threshold: f32) -> Template {
        Template {
            name: name.to_string(),
            image: BgrImage::from_pixel(4, 4, Rgb([1, 2, 3])),
            threshold,
            bound_key: None,
        }
    }

    fn binding(name: &str, key: &str) -> AbilityBinding {
        AbilityBinding {
            name: name.to_string(),
            key: Some(KeyCombo::parse(key).unwrap()),
            threshold: 0.7,
        }
    }

    #[test]
    fn test_library_rejects_duplicates() {
        let result = TemplateLibrary::new(vec![template("a", 0.5), template("a", 0.6)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_library_rejects_empty_images_and_bad_thresholds() {
        let mut empty = template("a", 0.5);
        empty.image = BgrImage::new(0, 0);
        assert!(TemplateLibrary::new(vec![empty]).is_err());
        assert!(TemplateLibrary::new(vec![template("b", 1.2)]).is_err());
    }

    #[test]
    fn test_library_keeps_insertion_order() {
        let library =
            TemplateLibrary::new(vec![template("c", 0.5), template("a", 0.5), template("b", 0.5)])
                .unwrap();
        let names: Vec<&str> = library.templates().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
        assert_eq!(library.get("a").unwrap().threshold, 0.5);
        assert!(library.get("z").is_none());
    }

    #[test]
    fn test_build_library_follows_bindings_and_skips_missing_icons() {
        let bindings = vec![binding("Fireball", "q"), binding("Blink", "e"), binding("Frostbolt", "w")];
        let icons = vec![
            ("Frostbolt".to_string(), BgrImage::new(8, 8)),
            ("Fireball".to_string(), BgrImage::new(8, 8)),
        ];

        let library = build_library(&bindings, icons).unwrap();
        let names: Vec<&str> = library.templates().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Fireball", "Frostbolt"]);
        assert_eq!(library.get("Frostbolt").unwrap().bound_key.as_ref().unwrap().key, "w");
        assert_eq!(library.get("Fireball").unwrap().threshold, 0.7);
    }

    #[test]
    fn test_load_icons_later_directory_overrides() {
        let base = tempdir().unwrap();
        let talent = tempdir().unwrap();

        image::RgbImage::from_pixel(4, 4, Rgb([255, 0, 0]))
            .save(base.path().join("Fireball.png"))
            .unwrap();
        image::RgbImage::from_pixel(4, 4, Rgb([0, 0, 255]))
            .save(talent.path().join("Fireball.png"))
            .unwrap();
        image::GrayImage::from_pixel(2, 2, image::Luma([9]))
            .save(base.path().join("Blink.png"))
            .unwrap();
        // Unbound ability and unsupported extension are ignored
        image::RgbImage::new(2, 2).save(base.path().join("Unbound.png")).unwrap();
        std::fs::write(base.path().join("Frostbolt.txt"), "not an image").unwrap();
        // Bound but corrupt
        std::fs::write(base.path().join("Frostbolt.png"), "not a png").unwrap();

        let dirs = vec![
            base.path().to_path_buf(),
            talent.path().to_path_buf(),
            base.path().join("missing"),
        ];
        let icons = load_icons(&dirs, &["Fireball", "Blink", "Frostbolt"]);

        let names: Vec<&str> = icons.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Blink", "Fireball"]);

        // RGB red from the base dir was replaced by RGB blue, stored as BGR
        let fireball = &icons[1].1;
        assert_eq!(fireball.get_pixel(0, 0).0, [255, 0, 0]);
        let blink = &icons[0].1;
        assert_eq!(blink.get_pixel(1, 1).0, [9, 9, 9]);
    }
}
