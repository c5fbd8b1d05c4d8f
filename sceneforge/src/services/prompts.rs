//! Instruction templates for the hosted generation models.

/// Instruction block asking the analysis model to decompose a photo into
/// standalone figurine subjects with one generation prompt each.
pub const FIGURINE_ANALYSIS_PROMPT: &str = "\
Analyze the provided photo and create a Chibi-style 3D printable figurine scene.

Instructions:
Identify the PRIMARY subjects that would work as standalone figurines (maximum 5)
Consider each subject as a complete, unified object - do not separate clothing, accessories, or held items from their owner
Generate detailed image prompts that will produce simple, 3D-printable Chibi figurines

For each object, create a prompt that:
- Explicitly mentions \"Chibi style 3D figurine\"
- Describes the subject as a unified whole
- Emphasizes rounded, simplified geometry
- Includes key identifying features but simplifies complex details
- Specifies a white background
- Uses descriptive, narrative language (not keywords)

Please provide:
Scene Overview: [1-2 sentences describing the original photo]
Identified Objects: [List the 1-5 main subjects]

Generation Prompts:
For each object, provide:
Object Name: [Simple identifier]
Prompt: [Full descriptive prompt following the guidelines above]

Focus only on subjects that are:
- In the foreground or mid-ground
- Large enough to be meaningful when printed
- Complete entities (not parts or accessories)
- Suitable for standalone display

Ignore:
- Backgrounds, walls, floors
- Small accessories that aren't held/worn
- Architectural elements
- Plants, trees, decorative elements
- Any objects that would be too thin or fragile when printed";

/// Instruction block for arranging generated figurine images into one
/// product-photoshoot composite.
pub const PHOTOSHOOT_COMPOSITE_PROMPT: &str = "\
Generate a product photoshoot in the style of these reference objects, arrange them so that they reflect the reference scene
Do not generate any new objects:
Arrange these objects together to reflect the reference
You can add an out-of-focus background, but it should be clearly seperate from the objects
Think out loud at length about how to do this, then return the image.";

/// Builds the full analysis prompt, appending the JSON response contract
/// that [`crate::core::SceneAnalysis`] deserializes.
#[must_use]
pub fn analysis_prompt() -> String {
    format!(
        "{FIGURINE_ANALYSIS_PROMPT}\n\n\
         Please respond with a valid JSON object in this exact format:\n\
         {{\n  \"sceneOverview\": \"string\",\n  \"identifiedObjects\": [\"string1\", \"string2\"],\n  \"generationPrompts\": [\n    {{\n      \"objectName\": \"string\",\n      \"prompt\": \"string\"\n    }}\n  ]\n}}"
    )
}

/// Builds the composite prompt with the caller's scene description spliced
/// into the reference block.
#[must_use]
pub fn composite_prompt(scene_description: &str) -> String {
    format!(
        "{PHOTOSHOOT_COMPOSITE_PROMPT}\n\n\
         <reference>\n{scene_description}\n</reference>\n\n\
         Generate a product photoshoot scene with chibi figurines."
    )
}

/// Builds the caption-suggestion prompt for one photo.
#[must_use]
pub fn suggestions_prompt(count: usize) -> String {
    format!(
        "Look at the provided photo and propose {count} scene ideas for a figurine photoshoot based on it.\n\
         For each idea provide a fun hook of 6-7 words and a detailed description of 2-4 sentences.\n\
         Mark exactly one idea, the most interesting, as recommended.\n\n\
         Please respond with a valid JSON object in this exact format:\n\
         {{\n  \"suggestions\": [\n    {{\n      \"funHook\": \"string\",\n      \"detailedDescription\": \"string\",\n      \"isRecommended\": true\n    }}\n  ]\n}}"
    )
}
