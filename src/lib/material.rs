//! Material definitions: the parameter catalog and the techniques resolved against it.

use crate::{
    asset::AssetLoader,
    shader::{
        definition::LoadOptions,
        error::{ErrorKind, LoadResult},
        parsing::{read_statements, Statement},
        technique::{read_technique, TechniqueDef},
    },
    Finalized,
};

use std::str::FromStr;

use log::warn;
use paste::paste;

macro_rules! var_types {
    {
        arrays { $($(#[$attr:meta])* $name:ident => $glsl:literal),+ $(,)? }
        single { $($(#[$sattr:meta])* $sname:ident => $sglsl:literal),+ $(,)? }
    } => {
        paste! {
            #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
            /// Material parameter types.
            pub enum VarType {
                $(
                    $(#[$attr])*
                    $name,

                    #[doc = concat!("Array of [", stringify!($name), "](VarType::", stringify!($name), ") values")]
                    [<$name Array>],
                )+
                $(
                    $(#[$sattr])*
                    $sname,
                )+
            }

            impl VarType {
                /// GLSL type of the uniform. Textures may list several sampler kinds separated by
                /// `|`, resolved against the consuming input.
                pub fn glsl_type(&self) -> &'static str {
                    match self {
                        $(
                            Self::$name | Self::[<$name Array>] => $glsl,
                        )+
                        $(
                            Self::$sname => $sglsl,
                        )+
                    }
                }

                /// Only array types accept a multiplicity.
                pub fn is_array(&self) -> bool {
                    matches!(self, $(Self::[<$name Array>])|+)
                }
            }

            impl FromStr for VarType {
                type Err = ErrorKind;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    Ok(match s {
                        $(
                            stringify!($name) => Self::$name,
                            stringify!([<$name Array>]) => Self::[<$name Array>],
                        )+
                        $(
                            stringify!($sname) => Self::$sname,
                        )+
                        other => Err(ErrorKind::UnknownVarType(other.to_owned()))?,
                    })
                }
            }
        }
    };
}

var_types! {
    arrays {
        /// Single float
        Float => "float",
        /// 2D vector
        Vector2 => "vec2",
        /// 3D vector
        Vector3 => "vec3",
        /// 4D vector
        Vector4 => "vec4",
        /// Integer
        Int => "int",
        /// Boolean
        Boolean => "bool",
        /// 3x3 matrix
        Matrix3 => "mat3",
        /// 4x4 matrix
        Matrix4 => "mat4",
    }
    single {
        /// RGBA color
        Color => "vec4",
        /// 2D texture, plain or shadow
        Texture2D => "sampler2D|sampler2DShadow",
        /// 3D texture
        Texture3D => "sampler3D",
        /// Layered 2D texture, plain or shadow
        TextureArray => "sampler2DArray|sampler2DArrayShadow",
        /// Cube map
        TextureCubeMap => "samplerCube",
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// A parameter declared in `MaterialParameters`.
pub struct MatParam {
    /// Parameter name, as written in `MatParam.<name>`.
    pub name: String,
    /// Declared type.
    pub var_type: VarType,
    /// Default value text, unparsed.
    pub default: Option<String>,
}

impl MatParam {
    /// Name of the uniform declared for this parameter.
    pub fn prefixed_name(&self) -> String {
        format!("m_{}", self.name)
    }
}

#[derive(Clone, Debug)]
/// A loaded material definition.
pub struct MaterialDef {
    /// Material name.
    pub name: String,
    /// Parameter catalog.
    pub params: Vec<MatParam>,
    /// Usable techniques, in declaration order.
    pub techniques: Vec<TechniqueDef<Finalized>>,
}

impl MaterialDef {
    /// Create a material without techniques.
    pub fn new(name: &str, params: Vec<MatParam>) -> Self {
        Self {
            name: name.to_owned(),
            params,
            techniques: vec![],
        }
    }

    /// Find a parameter by name.
    pub fn param(&self, name: &str) -> Option<&MatParam> {
        self.params.iter().find(|param| param.name == name)
    }
}

/// Read a `<VarType> <Name> [: <default>]` parameter line.
fn read_param(statement: &Statement) -> LoadResult<MatParam> {
    let (declaration, default) = match statement.line.split_once(':') {
        Some((declaration, default)) => (declaration, Some(default.trim().to_owned())),
        None => (statement.line.as_str(), None),
    };

    let tokens = declaration.split_whitespace().collect::<Vec<_>>();
    let [var_type, name] = tokens.as_slice() else {
        return Err(ErrorKind::MalformedStatement("MaterialParameter").at(statement));
    };

    Ok(MatParam {
        name: name.to_string(),
        var_type: var_type.parse().map_err(|kind: ErrorKind| kind.at(statement))?,
        default,
    })
}

/// Read a whole material definition file.
///
/// Every technique is resolved independently against the parameter catalog. Techniques without
/// shader sources nor shader nodes are dropped.
pub fn read_material_def<L: AssetLoader>(
    text: &str,
    loader: &mut L,
    options: LoadOptions,
) -> LoadResult<MaterialDef> {
    let statements = read_statements(text)?;
    let [root] = statements.as_slice() else {
        return Err(ErrorKind::MalformedStatement("MaterialDef").into());
    };

    let Some(name) = root.line.strip_prefix("MaterialDef") else {
        return Err(ErrorKind::UnexpectedStatement {
            expected: "MaterialDef",
            got: root.keyword().to_owned(),
        }
        .at(root));
    };

    let mut params = vec![];
    for statement in root
        .contents
        .iter()
        .filter(|statement| statement.keyword() == "MaterialParameters")
    {
        for param in statement.contents.iter() {
            params.push(read_param(param)?);
        }
    }

    let mut material = MaterialDef::new(name.trim(), params);

    for statement in root.contents.iter() {
        match statement.keyword() {
            "MaterialParameters" => {}
            "Technique" => match read_technique(statement, &material, loader, options)? {
                Some(technique) => material.techniques.push(technique),
                None => warn!(
                    "Technique `{}` of `{}` has neither shader sources nor shader nodes, skipping it",
                    statement.line, material.name
                ),
            },
            other => {
                return Err(ErrorKind::UnexpectedStatement {
                    expected: "one of MaterialParameters, Technique",
                    got: other.to_owned(),
                }
                .at(statement))
            }
        }
    }

    Ok(material)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn var_types() {
        assert_eq!("Vector4Array".parse::<VarType>(), Ok(VarType::Vector4Array));
        assert_eq!(VarType::Vector4Array.glsl_type(), "vec4");
        assert!(VarType::Vector4Array.is_array());
        assert!(!VarType::Vector4.is_array());
        assert!(!VarType::Texture2D.is_array());
        assert_eq!(VarType::Texture2D.glsl_type(), "sampler2D|sampler2DShadow");
        assert_eq!(
            "Texture4D".parse::<VarType>(),
            Err(ErrorKind::UnknownVarType("Texture4D".to_owned()))
        );
    }

    #[test]
    fn params() {
        let param = read_param(&Statement::new("Color Diffuse : 1.0 1.0 1.0 1.0", 1)).unwrap();

        assert_eq!(param.name, "Diffuse");
        assert_eq!(param.var_type, VarType::Color);
        assert_eq!(param.default.as_deref(), Some("1.0 1.0 1.0 1.0"));
        assert_eq!(param.prefixed_name(), "m_Diffuse");

        let err = read_param(&Statement::new("Color", 4)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedStatement("MaterialParameter"));
    }

    const MATERIAL: &str = r#"
        MaterialDef Simple {
            MaterialParameters {
                Color Color : 1.0 1.0 1.0 1.0
                Boolean UseFog
            }
            Technique {
                ShaderNodesDefinitions {
                    ShaderNodeDefinition Tint {
                        Type: Fragment
                        Input {
                            vec4 color
                        }
                        Output {
                            vec4 outColor
                        }
                    }
                }
                FragmentShaderNodes {
                    ShaderNode Tint {
                        Definition : Tint
                        Condition : UseFog
                        InputMappings {
                            color = MatParam.Color
                        }
                        OutputMappings {
                            Global.color = outColor
                        }
                    }
                }
            }
            Technique Empty {
                RenderState {
                    FaceCull Off
                }
            }
        }
    "#;

    #[test]
    fn material_def() {
        let material = read_material_def(
            MATERIAL,
            &mut crate::asset::MemoryAssets::default(),
            LoadOptions::default(),
        );
        assert!(material.is_ok(), "Expected a success, got `{material:?}`");
        let material = material.unwrap();

        assert_eq!(material.name, "Simple");
        assert_eq!(material.params.len(), 2);
        assert_eq!(material.techniques.len(), 1);

        let technique = &material.techniques[0];
        assert_eq!(technique.name, None);
        assert_eq!(technique.nodes[0].definition.path, None);

        let color = technique.info.fragment_uniforms[0];
        assert_eq!(technique.variables[color].name, "m_Color");
        assert_eq!(
            technique.variables[color].condition.as_deref(),
            Some("defined(USEFOG)")
        );
    }

    #[test]
    fn material_def_errors() {
        let mut assets = crate::asset::MemoryAssets::default();

        let err = read_material_def("Material Foo {}", &mut assets, LoadOptions::default())
            .unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::UnexpectedStatement {
                expected: "MaterialDef",
                got: "Material".to_owned(),
            }
        );

        let err = read_material_def(
            "MaterialDef Foo {\n Parameters {}\n}",
            &mut assets,
            LoadOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.location.map(|l| l.line), Some(2));
    }
}
