//! Engine-supplied uniforms available to techniques as `WorldParam.<Binding>`.

use crate::shader::error::ErrorKind;

use std::str::FromStr;

use derive_more::Display;

macro_rules! uniform_bindings {
    { $($glsl:literal => [$($(#[$attr:meta])* $name:ident),+ $(,)?]),+ $(,)? } => {
        #[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
        /// World parameters the engine updates every frame.
        pub enum UniformBinding {
            $($(
                $(#[$attr])*
                $name,
            )+)+
        }

        impl UniformBinding {
            /// GLSL type the uniform is declared with.
            pub fn glsl_type(&self) -> &'static str {
                match self {
                    $($(Self::$name)|+ => $glsl,)+
                }
            }

            /// Name of the declared uniform.
            pub fn uniform_name(&self) -> String {
                format!("g_{self}")
            }
        }

        impl FromStr for UniformBinding {
            type Err = ErrorKind;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(match s {
                    $($(stringify!($name) => Self::$name,)+)+
                    other => Err(ErrorKind::UnknownBinding(other.to_owned()))?,
                })
            }
        }
    };
}

uniform_bindings! {
    "mat4" => [
        /// Model to world.
        WorldMatrix,
        /// World to camera.
        ViewMatrix,
        /// Camera to clip space.
        ProjectionMatrix,
        /// Model to camera.
        WorldViewMatrix,
        /// Model to clip space.
        WorldViewProjectionMatrix,
        /// World to clip space.
        ViewProjectionMatrix,
        #[allow(missing_docs)]
        WorldMatrixInverse,
        #[allow(missing_docs)]
        ViewMatrixInverse,
        #[allow(missing_docs)]
        ProjectionMatrixInverse,
        #[allow(missing_docs)]
        ViewProjectionMatrixInverse,
        #[allow(missing_docs)]
        WorldViewMatrixInverse,
        #[allow(missing_docs)]
        WorldViewProjectionMatrixInverse,
    ],
    "mat3" => [
        /// Inverse transpose of the upper 3x3 of the world view matrix.
        NormalMatrix,
        /// Inverse transpose of the upper 3x3 of the world matrix.
        WorldNormalMatrix,
        #[allow(missing_docs)]
        WorldMatrixInverseTranspose,
        #[allow(missing_docs)]
        NormalMatrixInverse,
    ],
    "vec4" => [
        /// Viewport rectangle `(x, y, width, height)`.
        ViewPort,
        #[allow(missing_docs)]
        LightDirection,
        #[allow(missing_docs)]
        LightPosition,
        #[allow(missing_docs)]
        AmbientLightColor,
        #[allow(missing_docs)]
        LightColor,
    ],
    "vec3" => [
        /// Camera location in world space.
        CameraPosition,
        #[allow(missing_docs)]
        CameraDirection,
        #[allow(missing_docs)]
        CameraLeft,
        #[allow(missing_docs)]
        CameraUp,
    ],
    "vec2" => [
        /// Near and far frustum planes.
        FrustumNearFar,
        /// Viewport size in pixels.
        Resolution,
        /// `1 / Resolution`.
        ResolutionInverse,
    ],
    "float" => [
        /// Viewport aspect ratio.
        Aspect,
        /// Seconds since the application started.
        Time,
        /// Time per frame.
        Tpf,
        /// Frames per second.
        FrameRate,
    ],
}
