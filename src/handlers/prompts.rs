use crate::models::NutritionRecord;

const NUTRITIONIST_PROMPT: &str = r#"You are an expert nutritionist. Analyze the image and provide a detailed report on the nutritional content of the food items in the image.
Identify the food automatically and return the data in exactly this JSON structure, inside a ```json fenced block:
{
    "ingredients": ["ingredient1", "ingredient2", "..."],
    "nutritional_values": {
        "calories": "X calories",
        "protein": "X grams",
        "carbohydrates": "X grams",
        "fats": "X grams",
        "macro_nutrients": {
            "fiber": "X grams",
            "sugar": "X grams",
            "saturated_fat": "X grams",
            "unsaturated_fat": "X grams"
        },
        "micro_nutrients": {
            "vitamin_a": "X IU",
            "vitamin_c": "X mg",
            "vitamin_d": "X IU",
            "vitamin_e": "X mg",
            "vitamin_k": "X mcg",
            "calcium": "X mg",
            "iron": "X mg",
            "magnesium": "X mg",
            "potassium": "X mg",
            "zinc": "X mg",
            "sodium": "X mg"
        }
    },
    "serving_size": "X grams",
    "meal_type": "breakfast/lunch/dinner/snack"
}
Keep the values as accurate as the visual and contextual information in the image allows."#;

/// Preset analysis instructions offered to the user.
pub fn preset_instructions() -> &'static [&'static str] {
    &[NUTRITIONIST_PROMPT]
}

pub fn default_instruction() -> &'static str {
    NUTRITIONIST_PROMPT
}

/// Fields the rendered label must show.
pub const REQUIRED_LABEL_FIELDS: [&str; 6] = [
    "Serving Size",
    "Calories",
    "Macronutrients (Protein, Carbohydrates, Fats, Fiber, Sugar, Saturated Fat, Unsaturated Fat)",
    "Micronutrients (Vitamins A, C, D, E, K, Calcium, Iron, Magnesium, Potassium, Zinc, Sodium)",
    "Ingredient List",
    "Meal Type (Breakfast, Lunch, Dinner, Snack)",
];

/// Instruction for the image model, with the record embedded as pretty JSON.
pub fn label_prompt(record: &NutritionRecord) -> String {
    let fields = REQUIRED_LABEL_FIELDS
        .iter()
        .map(|field| format!("    - {}", field))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Generate a high-quality, FDA-style nutrition label image from the structured data below.\n\
         Include every key section (serving size, calories, macronutrients, micronutrients, ingredient list) \
         laid out clearly for human reading, with official FDA label fonts, black-and-white contrast \
         and clear separation between sections.\n\
         \n\
         Data:\n\
         {}\n\
         \n\
         The label must clearly display:\n\
         {}\n\
         \n\
         Mimic official FDA packaging: aligned tables or sections, readable numeric values, \
         sharp and aligned text with no blur.",
        record.to_pretty_string(),
        fields
    )
}
