//! Compatibility rules between the two sides of a mapping.

use super::{
    error::ErrorKind,
    variable::{cardinality, ShaderNodeVariable},
};

/// Separator of sampler alternatives in a parameter type.
pub const UNION_SEPARATOR: char = '|';

/// Pick the alternative of a sampler union matching `left_type`.
///
/// # Example
/// ```
/// use shnode::shader::typecheck::collapse_sampler_union;
///
/// assert_eq!(
///     collapse_sampler_union("sampler2DShadow", "sampler2D|sampler2DShadow").as_deref(),
///     Some("sampler2DShadow")
/// );
/// assert_eq!(collapse_sampler_union("samplerCube", "sampler2D|sampler2DShadow"), None);
/// ```
pub fn collapse_sampler_union(left_type: &str, union: &str) -> Option<String> {
    union
        .split(UNION_SEPARATOR)
        .find(|alternative| *alternative == left_type)
        .map(str::to_owned)
}

fn types_match(
    left: &ShaderNodeVariable,
    left_swizzle: &str,
    right: &ShaderNodeVariable,
    right_swizzle: &str,
) -> bool {
    if left.r#type == right.r#type && left_swizzle.len() == right_swizzle.len() {
        return true;
    }

    if let (Some(l), Some(r)) = (
        cardinality(&left.r#type, left_swizzle),
        cardinality(&right.r#type, right_swizzle),
    ) {
        return l == r;
    }

    collapse_sampler_union(&left.r#type, &right.r#type).is_some()
        || collapse_sampler_union(&right.r#type, &left.r#type).is_some()
}

fn multiplicities_match(left: &ShaderNodeVariable, right: &ShaderNodeVariable) -> bool {
    match (&left.multiplicity, &right.multiplicity) {
        (None, None) => true,
        (Some(l), Some(r)) => l.eq_ignore_ascii_case(r),
        _ => false,
    }
}

/// Check both sides of a mapping: component counts first, then array sizes.
pub fn check(
    left: &ShaderNodeVariable,
    left_swizzle: &str,
    right: &ShaderNodeVariable,
    right_swizzle: &str,
) -> Result<(), ErrorKind> {
    if !types_match(left, left_swizzle, right, right_swizzle) {
        return Err(ErrorKind::TypeMismatch {
            left: left.describe(left_swizzle),
            right: right.describe(right_swizzle),
        });
    }

    if !multiplicities_match(left, right) {
        return Err(ErrorKind::MultiplicityMismatch {
            left: left.describe_array(),
            right: right.describe_array(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn var(r#type: &str) -> ShaderNodeVariable {
        ShaderNodeVariable::new(r#type, "v")
    }

    fn array(r#type: &str, multiplicity: &str) -> ShaderNodeVariable {
        var(r#type).with_multiplicity(Some(multiplicity.to_owned()))
    }

    #[test]
    fn swizzle_cardinality() {
        assert!(check(&var("vec2"), "", &var("vec4"), "xy").is_ok());
        assert!(check(&var("vec4"), "xy", &var("vec2"), "").is_ok());
        assert!(check(&var("float"), "", &var("vec4"), "w").is_ok());

        let err = check(&var("vec2"), "", &var("vec4"), "xyz").unwrap_err();
        assert_eq!(
            err,
            ErrorKind::TypeMismatch {
                left: "vec2".to_owned(),
                right: "vec4.xyz".to_owned(),
            }
        );
    }

    #[test]
    fn unswizzlable_types() {
        assert!(check(&var("mat4"), "", &var("mat4"), "").is_ok());
        assert!(check(&var("mat3"), "", &var("mat4"), "").is_err());
        assert!(check(&var("sampler2D"), "", &var("vec4"), "").is_err());
    }

    #[test]
    fn sampler_unions() {
        let union = var("sampler2D|sampler2DShadow");

        assert!(check(&var("sampler2D"), "", &union, "").is_ok());
        assert!(check(&var("sampler2DShadow"), "", &union, "").is_ok());
        assert!(check(&var("sampler3D"), "", &union, "").is_err());
    }

    #[test]
    fn multiplicities() {
        assert!(check(&array("vec4", "4"), "", &array("vec4", "4"), "").is_ok());
        assert!(check(&array("vec4", "NbLights"), "", &array("vec4", "NBLIGHTS"), "").is_ok());

        let err = check(&array("vec4", "4"), "", &var("vec4"), "").unwrap_err();
        assert_eq!(
            err,
            ErrorKind::MultiplicityMismatch {
                left: "vec4[4]".to_owned(),
                right: "vec4[]".to_owned(),
            }
        );
        assert!(check(&array("vec4", "4"), "", &array("vec4", "8"), "").is_err());
    }
}
